//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → forwarder.rs (pool selection, single forward attempt)
//!     → backend response or 503 to client
//! ```

pub mod forwarder;
pub mod request;
pub mod server;

pub use forwarder::AppState;
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
