//! Reachability probes.
//!
//! # Responsibilities
//! - Decide whether a down backend is reachable again
//! - Bound every probe with a short timeout
//!
//! # Design Decisions
//! - TCP connect is the default: it tests reachability only
//! - The HTTP probe accepts any response status; only transport
//!   failure counts as unreachable
//! - Probes never share connections with the forwarding path

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;

use crate::config::{HealthCheckConfig, ProbeKind};
use crate::load_balancer::Backend;

/// A probe strategy, built once per pool and cloned into each checker.
#[derive(Clone, Debug)]
pub enum Probe {
    Tcp {
        timeout: Duration,
    },
    Http {
        path: String,
        timeout: Duration,
        client: Client<HttpConnector, Body>,
    },
}

impl Probe {
    pub fn from_config(config: &HealthCheckConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        match config.probe {
            ProbeKind::Tcp => Probe::Tcp { timeout },
            ProbeKind::Http => {
                // No idle pooling: every probe opens its own connection.
                let client = Client::builder(TokioExecutor::new())
                    .pool_max_idle_per_host(0)
                    .build(HttpConnector::new());
                let path = if config.path.starts_with('/') {
                    config.path.clone()
                } else {
                    format!("/{}", config.path)
                };
                Probe::Http {
                    path,
                    timeout,
                    client,
                }
            }
        }
    }

    pub fn kind(&self) -> ProbeKind {
        match self {
            Probe::Tcp { .. } => ProbeKind::Tcp,
            Probe::Http { .. } => ProbeKind::Http,
        }
    }

    /// Returns true if the backend answered within the timeout.
    pub async fn check(&self, backend: &Backend) -> bool {
        match self {
            Probe::Tcp { timeout } => {
                let authority = backend.authority();
                match time::timeout(*timeout, TcpStream::connect(authority.as_str())).await {
                    Ok(Ok(stream)) => {
                        drop(stream);
                        true
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(backend = %backend.address(), error = %e, "TCP probe failed");
                        false
                    }
                    Err(_) => {
                        tracing::debug!(backend = %backend.address(), "TCP probe timed out");
                        false
                    }
                }
            }
            Probe::Http {
                path,
                timeout,
                client,
            } => {
                let uri = format!("http://{}{}", backend.authority(), path);
                let request = match Request::builder()
                    .method("GET")
                    .uri(uri)
                    .header("user-agent", "rr-proxy-health-check")
                    .body(Body::empty())
                {
                    Ok(req) => req,
                    Err(e) => {
                        tracing::error!(backend = %backend.address(), error = %e, "Failed to build health probe request");
                        return false;
                    }
                };

                match time::timeout(*timeout, client.request(request)).await {
                    Ok(Ok(response)) => {
                        tracing::debug!(backend = %backend.address(), status = %response.status(), "HTTP probe answered");
                        true
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(backend = %backend.address(), error = %e, "HTTP probe failed");
                        false
                    }
                    Err(_) => {
                        tracing::debug!(backend = %backend.address(), "HTTP probe timed out");
                        false
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::load_balancer::backend::parse_address;
    use crate::load_balancer::proxy::{build_client, Proxy};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn backend_at(addr: std::net::SocketAddr) -> Backend {
        let url = parse_address(&format!("http://{}", addr)).unwrap();
        let proxy = Proxy::new(
            url.clone(),
            build_client(&TransportConfig::default()),
            Duration::from_secs(1),
        );
        Backend::new(0, url, proxy)
    }

    fn config(probe: ProbeKind) -> HealthCheckConfig {
        HealthCheckConfig {
            timeout_ms: 200,
            probe,
            path: "status".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn tcp_probe_detects_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend = backend_at(listener.local_addr().unwrap());
        let probe = Probe::from_config(&config(ProbeKind::Tcp));

        assert!(probe.check(&backend).await);

        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(!probe.check(&backend_at(addr)).await);
    }

    #[tokio::test]
    async fn http_probe_accepts_error_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
                let _ = socket.shutdown().await;
            }
        });

        let probe = Probe::from_config(&config(ProbeKind::Http));
        assert_eq!(probe.kind(), ProbeKind::Http);
        assert!(probe.check(&backend_at(addr)).await);
    }

    #[tokio::test]
    async fn http_probe_fails_on_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = Probe::from_config(&config(ProbeKind::Http));
        assert!(!probe.check(&backend_at(addr)).await);
    }
}
