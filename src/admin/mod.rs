//! Admin API for runtime inspection and peer registration.
//!
//! # Endpoints
//! - `GET /admin/status`: version and pool summary
//! - `GET /admin/backends`: every backend with its liveness
//! - `POST /admin/peers`: append a backend (`{"address": "http://host:port"}`)
//!
//! All endpoints require `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::load_balancer::ServerPool;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub pool: Arc<ServerPool>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(pool: Arc<ServerPool>, api_key: &str) -> Router {
    let state = AdminState {
        pool,
        api_key: Arc::from(api_key),
    };

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .route("/admin/peers", post(add_peer))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
