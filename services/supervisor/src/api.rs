//! HTTP API for receiving assignment pushes.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempest_assignments::{
    AssignmentReceiver, ReceiveError, SupervisorAssignments, RECEIVE_ASSIGNMENTS_PATH,
};
use tower_http::trace::TraceLayer;

use crate::Supervisor;

/// Build the supervisor router.
pub fn router(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(RECEIVE_ASSIGNMENTS_PATH, post(receive_assignments))
        .layer(TraceLayer::new_for_http())
        .with_state(supervisor)
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node: String,
    pub version: String,
    pub timestamp: String,
    pub receipts: u64,
}

async fn healthz(State(supervisor): State<Arc<Supervisor>>) -> impl IntoResponse {
    let status = if supervisor.is_stopped() { "stopped" } else { "ok" };
    Json(HealthResponse {
        status: status.to_string(),
        node: supervisor.id().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        receipts: supervisor.receipt_count(),
    })
}

async fn receive_assignments(
    State(supervisor): State<Arc<Supervisor>>,
    Json(assignments): Json<SupervisorAssignments>,
) -> Result<StatusCode, ApiError> {
    supervisor.receive_assignments(assignments).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Error body returned to the coordinator.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl From<ReceiveError> for ApiError {
    fn from(err: ReceiveError) -> Self {
        let (status, code) = match &err {
            ReceiveError::Stopped(_) => (StatusCode::SERVICE_UNAVAILABLE, "supervisor_stopped"),
        };
        Self {
            status,
            body: ErrorBody {
                code: code.to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
