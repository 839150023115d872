//! Round-robin reverse-proxy load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request    ┌────────┐    ┌───────────┐    ┌─────────────┐
//!     ─────────────────▶│  http  │───▶│ forwarder │───▶│ ServerPool  │
//!                       │ server │    └─────┬─────┘    │ round-robin │
//!                       └────────┘          │          └──────┬──────┘
//!                                           ▼                 │ mark_down
//!     Client Response   ┌────────────────────────┐            ▼
//!     ◀─────────────────│ backend proxy (shared  │     ┌──────────────┐
//!                       │ connection-reuse pool) │     │health checker│
//!                       └────────────────────────┘     │ (per backend)│
//!                                                      └──────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod load_balancer;

// Traffic management
pub mod health;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use config::BalancerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Backend, ServerPool};
