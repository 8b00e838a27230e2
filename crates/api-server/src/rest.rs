//! Shared REST state, error mapping and operational endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use reengage_core::ReengageError;
use reengage_export::RecordTransformer;
use reengage_workflow::ReengagementWorkflow;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<ReengagementWorkflow>,
    pub transformer: Arc<RecordTransformer>,
    pub node_id: String,
    pub start_time: Instant,
}

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        workflows: state.workflow.list().len(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live — Liveness probe.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub workflows: usize,
    pub uptime_secs: u64,
}

/// Step failure surfaced to the scheduler with its underlying cause.
pub struct ApiError(pub ReengageError);

impl From<ReengageError> for ApiError {
    fn from(err: ReengageError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            ReengageError::Service { .. } => (StatusCode::BAD_GATEWAY, "service_error"),
            ReengageError::WorkflowNotFound(_) => (StatusCode::NOT_FOUND, "workflow_not_found"),
            ReengageError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            ReengageError::ResolutionAmbiguity { .. } => {
                (StatusCode::CONFLICT, "resolution_ambiguity")
            }
            ReengageError::DuplicateImport { .. } => (StatusCode::CONFLICT, "duplicate_import"),
            ReengageError::StepInProgress { .. } => (StatusCode::CONFLICT, "step_in_progress"),
            ReengageError::RecordProcessing { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "record_processing_failed")
            }
            ReengageError::Config(_)
            | ReengageError::Serialization(_)
            | ReengageError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        metrics::counter!("api.errors", "code" => code).increment(1);
        (
            status,
            Json(ErrorResponse {
                error: code.to_string(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
