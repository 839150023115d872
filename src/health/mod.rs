//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Passive detection (http forwarder):
//!     Transport failure observed
//!     → pool.mark_down(backend)
//!     → the transitioning caller spawns checker.rs
//!
//! Recovery (checker.rs):
//!     Periodic timer
//!     → probe.rs (TCP connect or HTTP GET)
//!     → success: pool.mark_up(backend), checker exits
//!     → failure: wait for next tick
//! ```
//!
//! # Design Decisions
//! - Checkers exist only for down backends, one per backend
//! - Healthy backends are never probed; traffic is the signal
//! - Health state is a single per-backend flag owned by the pool

pub mod checker;
pub mod probe;

pub use checker::HealthChecker;
pub use probe::Probe;
