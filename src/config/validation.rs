//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate every backend address the pool would reject
//! - Validate value ranges (intervals > 0, timeouts shorter than intervals)
//! - Keep the backend response deadline inside the request deadline
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::BalancerConfig;
use crate::load_balancer::backend::parse_address;
use crate::load_balancer::PoolError;

/// A single semantic problem in a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,
    #[error("backends[{index}]: {source}")]
    Backend {
        index: usize,
        #[source]
        source: PoolError,
    },
    #[error("{field}: invalid socket address {value:?}")]
    BindAddress { field: &'static str, value: String },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("health_check.timeout_ms ({timeout_ms}) must be shorter than health_check.interval_ms ({interval_ms})")]
    ProbeTimeout { timeout_ms: u64, interval_ms: u64 },
    #[error("timeouts.request_secs ({request_secs}) must be longer than transport.response_timeout_secs ({response_secs})")]
    RequestTimeout { request_secs: u64, response_secs: u64 },
    #[error("admin.api_key must be set when the admin API is enabled")]
    AdminKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }
    for (index, address) in config.backends.iter().enumerate() {
        if let Err(source) = parse_address(address) {
            errors.push(ValidationError::Backend { index, source });
        }
    }

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_socket_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }
    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::AdminKey);
        }
    }

    let health = &config.health_check;
    check_non_zero(&mut errors, "health_check.interval_ms", health.interval_ms);
    check_non_zero(&mut errors, "health_check.timeout_ms", health.timeout_ms);
    if health.interval_ms > 0 && health.timeout_ms >= health.interval_ms {
        errors.push(ValidationError::ProbeTimeout {
            timeout_ms: health.timeout_ms,
            interval_ms: health.interval_ms,
        });
    }

    check_non_zero(&mut errors, "transport.connect_timeout_ms", config.transport.connect_timeout_ms);
    check_non_zero(&mut errors, "transport.response_timeout_secs", config.transport.response_timeout_secs);
    check_non_zero(&mut errors, "timeouts.request_secs", config.timeouts.request_secs);
    // The per-backend deadline must fire first so a hung backend is marked down.
    if config.timeouts.request_secs <= config.transport.response_timeout_secs {
        errors.push(ValidationError::RequestTimeout {
            request_secs: config.timeouts.request_secs,
            response_secs: config.transport.response_timeout_secs,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_non_zero(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    }
}
