//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define balancer metrics (requests, latency, liveness, transitions)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-backend and aggregate metrics
//!
//! # Metrics
//! - `lb_requests_total` (counter): requests by status and backend
//! - `lb_request_duration_seconds` (histogram): latency distribution
//! - `lb_backend_alive` (gauge): 1=alive, 0=down
//! - `lb_backend_transitions_total` (counter): liveness transitions by direction
//! - `lb_health_checks_total` (counter): probe results by backend
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op (tests, disabled config)
//! - Labels for backend and status code only

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed inbound request.
pub fn record_request(status: u16, backend: &str, start: Instant) {
    metrics::counter!(
        "lb_requests_total",
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    metrics::histogram!("lb_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_backend_alive(backend: &str, alive: bool) {
    metrics::gauge!("lb_backend_alive", "backend" => backend.to_string())
        .set(if alive { 1.0 } else { 0.0 });
}

/// Record a real liveness transition (never a no-op one).
pub fn record_transition(backend: &str, alive: bool) {
    let to = if alive { "up" } else { "down" };
    metrics::counter!(
        "lb_backend_transitions_total",
        "backend" => backend.to_string(),
        "to" => to
    )
    .increment(1);
    record_backend_alive(backend, alive);
}

pub fn record_health_check(backend: &str, reachable: bool) {
    let result = if reachable { "success" } else { "failure" };
    metrics::counter!(
        "lb_health_checks_total",
        "backend" => backend.to_string(),
        "result" => result
    )
    .increment(1);
}
