//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → pool.rs (snapshot of the append-only backend list)
//!     → round_robin.rs (shared cursor, skip dead backends)
//!     → backend.rs (liveness flag + forward handle)
//!     → proxy.rs (forward over the shared transport)
//!     → Response, or transport failure → pool.mark_down()
//! ```
//!
//! # Design Decisions
//! - Selection never blocks: cursor and liveness are atomics
//! - Backend list is copy-on-append; writers serialize on a mutex
//! - Only the caller that performs a transition produces side effects
//! - Forward handle reports failures as values, it never mutates the pool

pub mod backend;
pub mod pool;
pub mod proxy;
pub mod round_robin;

pub use backend::Backend;
pub use pool::ServerPool;
pub use proxy::{ForwardError, Proxy};

/// Error type for pool membership operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The address could not be parsed as a URL.
    #[error("invalid backend address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },
    /// The address parsed but uses a scheme we cannot forward to.
    #[error("unsupported scheme {scheme:?} in backend address {address:?}")]
    UnsupportedScheme { address: String, scheme: String },
    /// The address has no host or no resolvable port.
    #[error("backend address {0:?} must include a host and port")]
    MissingHost(String),
}
