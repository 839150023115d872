//! Forward handle for a single backend.
//!
//! # Responsibilities
//! - Rewrite an inbound request onto the backend's address
//! - Strip hop-by-hop headers, append `X-Forwarded-For`
//! - Send over the shared, connection-reusing transport
//! - Report the outcome as a value: response or transport failure
//!
//! # Design Decisions
//! - The handle has no knowledge of liveness; the caller gates on it
//! - Any HTTP response, including 5xx, is a successful forward
//! - A response timeout is a transport failure

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{Request, Response, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::config::TransportConfig;

/// Shared HTTP client type used by every backend of a pool.
pub type HttpClient = Client<HttpConnector, Body>;

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers that apply to a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
];

/// Error returned by [`Proxy::forward`].
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// Connection refused, reset, or any other network-level failure.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
    /// No response head within the configured deadline.
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
    /// The inbound request could not be mapped onto the backend.
    #[error("could not build upstream request: {0}")]
    InvalidRequest(#[from] axum::http::Error),
}

impl ForwardError {
    /// True when the failure says something about the backend's reachability.
    pub fn is_transport(&self) -> bool {
        matches!(self, ForwardError::Upstream(_) | ForwardError::Timeout(_))
    }
}

/// Build the connection-reusing transport shared by all backends.
///
/// Idle connections are bounded per host and reaped after the idle timeout.
/// The client never negotiates response compression.
pub fn build_client(config: &TransportConfig) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_max_idle_per_host(config.max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .build(connector)
}

/// Forwarding mechanism bound to a single backend address.
#[derive(Clone, Debug)]
pub struct Proxy {
    scheme: Scheme,
    authority: Authority,
    /// Path prefix of the target, without a trailing slash.
    base_path: String,
    client: HttpClient,
    response_timeout: Duration,
}

impl Proxy {
    pub fn new(target: Url, client: HttpClient, response_timeout: Duration) -> Self {
        let host = target.host_str().unwrap_or_default();
        let authority = match target.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Self {
            scheme: Scheme::HTTP,
            // Hosts accepted by `parse_address` are always valid authorities.
            authority: Authority::from_str(&authority)
                .unwrap_or_else(|_| Authority::from_static("invalid.invalid")),
            base_path: target.path().trim_end_matches('/').to_string(),
            client,
            response_timeout,
        }
    }

    /// Forward `request` to the backend.
    pub async fn forward(
        &self,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Response<Body>, ForwardError> {
        let (mut parts, body) = request.into_parts();

        parts.uri = self.rewrite_uri(&parts.uri)?;
        strip_hop_by_hop(&mut parts.headers);
        if let Some(addr) = client_addr {
            append_forwarded_for(&mut parts.headers, addr);
        }

        let upstream = Request::from_parts(parts, body);
        let response = tokio::time::timeout(self.response_timeout, self.client.request(upstream))
            .await
            .map_err(|_| ForwardError::Timeout(self.response_timeout))??;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    fn rewrite_uri(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let path = uri.path();
        let joined = match uri.query() {
            Some(query) => format!("{}{}?{}", self.base_path, path, query),
            None => format!("{}{}", self.base_path, path),
        };
        let path_and_query = PathAndQuery::from_str(&joined).map_err(axum::http::Error::from)?;

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named by `Connection` are hop-by-hop as well.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_str(name.trim()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, addr: SocketAddr) {
    let ip = addr.ip().to_string();
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, ip),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::parse_address;
    use tokio::net::TcpListener;

    fn proxy(address: &str) -> Proxy {
        let url = parse_address(address).unwrap();
        Proxy::new(url, build_client(&TransportConfig::default()), Duration::from_millis(500))
    }

    #[test]
    fn rewrites_onto_target() {
        let p = proxy("http://127.0.0.1:3000");
        let uri = p.rewrite_uri(&"/items?page=2".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3000/items?page=2");
    }

    #[test]
    fn joins_target_path_prefix() {
        let p = proxy("http://127.0.0.1:3000/api/");
        let uri = p.rewrite_uri(&"/users".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3000/api/users");
    }

    #[test]
    fn strips_connection_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-private"));
        headers.insert("x-private", HeaderValue::from_static("1"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-kept", HeaderValue::from_static("yes"));

        strip_hop_by_hop(&mut headers);

        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("x-private").is_none());
        assert!(headers.get("keep-alive").is_none());
        assert_eq!(headers.get("x-kept").unwrap(), "yes");
    }

    #[test]
    fn appends_to_existing_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        append_forwarded_for(&mut headers, "192.168.1.7:5000".parse().unwrap());
        assert_eq!(headers.get("x-forwarded-for").unwrap(), "10.0.0.1, 192.168.1.7");
    }

    #[tokio::test]
    async fn refused_connection_is_transport_failure() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let p = proxy(&format!("http://{}", addr));
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let err = p.forward(request, None).await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn silent_backend_times_out() {
        // Accepts the connection but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let p = proxy(&format!("http://{}", addr));
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let err = p.forward(request, None).await.unwrap_err();
        assert!(matches!(err, ForwardError::Timeout(_)));
        assert!(err.is_transport());
    }
}
