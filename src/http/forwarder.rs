//! Request forwarder.
//!
//! # Responsibilities
//! - Ask the pool for the next alive backend
//! - Forward the request once through that backend's proxy
//! - Turn transport failures into a mark-down and a 503
//!
//! # Design Decisions
//! - Single attempt per request; no automatic retry on another backend
//! - Backend responses pass through untouched, whatever their status
//! - No partial responses: success from one backend, or 503

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::http::request::request_id;
use crate::load_balancer::ServerPool;
use crate::observability::metrics;

pub const NO_BACKEND_BODY: &str = "No backend available";
pub const UNAVAILABLE_BODY: &str = "Service unavailable";

/// Application state injected into the forwarder.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<ServerPool>,
}

/// Forward one inbound request.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request);
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let backend = match state.pool.next_backend() {
        Some(b) => b,
        None => {
            tracing::warn!(request_id = %request_id, "No backend available");
            metrics::record_request(503, "none", start_time);
            return (StatusCode::SERVICE_UNAVAILABLE, NO_BACKEND_BODY).into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        backend = %backend.address(),
        "Proxying request"
    );

    match backend.proxy().forward(request, client_addr).await {
        Ok(response) => {
            metrics::record_request(response.status().as_u16(), backend.address(), start_time);
            response
        }
        Err(e) if e.is_transport() => {
            tracing::warn!(
                request_id = %request_id,
                backend = %backend.address(),
                error = %e,
                "Connection to backend failed"
            );
            state.pool.mark_down(&backend);
            metrics::record_request(503, backend.address(), start_time);
            (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_BODY).into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, backend = %backend.address(), error = %e, "Could not forward request");
            metrics::record_request(502, backend.address(), start_time);
            (StatusCode::BAD_GATEWAY, "Bad gateway").into_response()
        }
    }
}
