//! Admin API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::registry::HealthState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub backends: usize,
}

#[derive(Serialize)]
pub struct BackendStatus {
    pub id: String,
    pub address: String,
    pub partition: Vec<u32>,
    pub state: &'static str,
    pub in_flight: usize,
    pub max_concurrent_requests: usize,
    pub max_batch_size: usize,
}

/// Result of a drain/activate operation.
#[derive(Serialize)]
pub struct MarkOutcome {
    pub id: String,
    pub state: &'static str,
    /// False when the backend was already in the requested state.
    pub transitioned: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        backends: state.registry.len(),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let statuses = state
        .registry
        .all()
        .iter()
        .map(|b| BackendStatus {
            id: b.id.clone(),
            address: b.addr.to_string(),
            partition: b.partition.clone(),
            state: b.state().as_str(),
            in_flight: b.in_flight(),
            max_concurrent_requests: b.max_concurrent_requests,
            max_batch_size: b.max_batch_size,
        })
        .collect();
    Json(statuses)
}

/// Exclude a backend from new admissions; in-flight work finishes.
pub async fn drain_backend(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<MarkOutcome>, StatusCode> {
    match state.registry.mark(&id, HealthState::Draining) {
        Some(transitioned) => Ok(Json(MarkOutcome {
            id,
            state: HealthState::Draining.as_str(),
            transitioned,
        })),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// Return a drained backend to rotation; the next probes settle its health.
pub async fn activate_backend(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<MarkOutcome>, StatusCode> {
    match state.registry.mark(&id, HealthState::Unknown) {
        Some(transitioned) => Ok(Json(MarkOutcome {
            id,
            state: HealthState::Unknown.as_str(),
            transitioned,
        })),
        None => Err(StatusCode::NOT_FOUND),
    }
}
