use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::load_balancer::Backend;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub backends: usize,
    pub alive: usize,
    pub health_checkers: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendStatus {
    pub id: usize,
    pub address: String,
    pub alive: bool,
    pub health_check_running: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddPeerRequest {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

fn backend_status(state: &AdminState, backend: &Backend) -> BackendStatus {
    BackendStatus {
        id: backend.id(),
        address: backend.address().to_string(),
        alive: backend.is_alive(),
        health_check_running: state.pool.is_checking(backend.id()),
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        backends: state.pool.len(),
        alive: state.pool.alive_count(),
        health_checkers: state.pool.active_checkers(),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let backends = state.pool.backends();
    Json(backends.iter().map(|b| backend_status(&state, b)).collect())
}

/// Register a new peer. An invalid address is a client error here, not a
/// reason to stop the process.
pub async fn add_peer(
    State(state): State<AdminState>,
    Json(body): Json<AddPeerRequest>,
) -> Result<(StatusCode, Json<BackendStatus>), (StatusCode, Json<ErrorBody>)> {
    match state.pool.add_peer(&body.address) {
        Ok(backend) => Ok((StatusCode::CREATED, Json(backend_status(&state, &backend)))),
        Err(e) => {
            tracing::warn!(address = %body.address, error = %e, "Rejected peer registration");
            Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
