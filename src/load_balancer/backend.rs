//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single forwarding target
//! - Hold the lock-free liveness flag read on every selection
//! - Own the forward handle bound to the backend's address

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

use crate::load_balancer::proxy::Proxy;
use crate::load_balancer::PoolError;

/// Parse and validate a backend address (`http://host:port`).
pub fn parse_address(address: &str) -> Result<Url, PoolError> {
    let url = Url::parse(address.trim()).map_err(|source| PoolError::InvalidAddress {
        address: address.to_string(),
        source,
    })?;

    if url.scheme() != "http" {
        return Err(PoolError::UnsupportedScheme {
            address: address.to_string(),
            scheme: url.scheme().to_string(),
        });
    }

    match (url.host_str(), url.port_or_known_default()) {
        (Some(host), Some(_)) if !host.is_empty() => Ok(url),
        _ => Err(PoolError::MissingHost(address.to_string())),
    }
}

/// Canonical string form of an address, used for identity comparison.
pub fn normalize_address(address: &str) -> String {
    match parse_address(address) {
        Ok(url) => url.as_str().trim_end_matches('/').to_string(),
        Err(_) => address.trim().trim_end_matches('/').to_string(),
    }
}

/// A single backend server.
pub struct Backend {
    /// Position in the pool's backend list.
    id: usize,
    /// Validated target location.
    url: Url,
    /// Liveness belief maintained by the pool.
    alive: AtomicBool,
    /// Forward handle bound to `url`.
    proxy: Proxy,
}

impl Backend {
    /// Create a new backend. Backends always start alive.
    pub(crate) fn new(id: usize, url: Url, proxy: Proxy) -> Self {
        Self {
            id,
            url,
            alive: AtomicBool::new(true),
            proxy,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Address string used for identity comparison and logging.
    /// Same form as [`normalize_address`].
    pub fn address(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }

    /// `host:port` pair used by connect-level probes.
    pub fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Flip alive → dead. Returns true only for the caller that flipped it.
    pub(crate) fn try_set_down(&self) -> bool {
        self.alive
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Flip dead → alive. Returns true only for the caller that flipped it.
    pub(crate) fn try_set_up(&self) -> bool {
        self.alive
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("id", &self.id)
            .field("address", &self.address())
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::proxy::build_client;
    use crate::config::TransportConfig;

    fn backend(address: &str) -> Backend {
        let url = parse_address(address).unwrap();
        let client = build_client(&TransportConfig::default());
        Backend::new(0, url.clone(), Proxy::new(url, client, std::time::Duration::from_secs(1)))
    }

    #[test]
    fn parse_accepts_host_and_port() {
        let url = parse_address("http://127.0.0.1:3000").unwrap();
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(3000));
    }

    #[test]
    fn parse_fills_default_port() {
        let url = parse_address("http://localhost").unwrap();
        assert_eq!(url.port_or_known_default(), Some(80));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            parse_address("not a url"),
            Err(PoolError::InvalidAddress { .. })
        ));
        assert!(matches!(
            parse_address("127.0.0.1:8080"),
            Err(PoolError::UnsupportedScheme { .. }) | Err(PoolError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn parse_rejects_other_schemes() {
        assert!(matches!(
            parse_address("ftp://files.local:21"),
            Err(PoolError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn normalizes_default_port_and_slash() {
        assert_eq!(normalize_address("http://example.com:80/"), "http://example.com");
        assert_eq!(normalize_address(" http://10.0.0.1:3000 "), "http://10.0.0.1:3000");
    }

    #[test]
    fn starts_alive_and_transitions_once() {
        let b = backend("http://127.0.0.1:3000");
        assert!(b.is_alive());

        assert!(b.try_set_down());
        assert!(!b.try_set_down(), "second down transition must be a no-op");
        assert!(!b.is_alive());

        assert!(b.try_set_up());
        assert!(!b.try_set_up(), "second up transition must be a no-op");
        assert!(b.is_alive());
    }

    #[test]
    fn address_and_authority() {
        let b = backend("http://127.0.0.1:3000");
        assert_eq!(b.address(), "http://127.0.0.1:3000");
        assert_eq!(b.authority(), "127.0.0.1:3000");
    }
}
