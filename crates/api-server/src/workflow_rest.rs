//! Workflow step endpoints invoked by the external scheduler.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use reengage_workflow::{ImportStarted, QueryStarted, StepStatus, WorkflowRecord};
use uuid::Uuid;

use crate::rest::{ApiError, AppState};

/// POST /v1/workflows — Register a new workflow in INIT.
pub async fn handle_create(State(state): State<AppState>) -> (StatusCode, Json<WorkflowRecord>) {
    metrics::counter!("api.workflows_created").increment(1);
    (StatusCode::CREATED, Json(state.workflow.create()))
}

/// GET /v1/workflows — All workflow records, oldest first.
pub async fn handle_list(State(state): State<AppState>) -> Json<Vec<WorkflowRecord>> {
    Json(state.workflow.list())
}

/// GET /v1/workflows/:id — Current state and handles.
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowRecord>, ApiError> {
    Ok(Json(state.workflow.get(id)?))
}

/// POST /v1/workflows/:id/query — Launch the unengaged-user query.
pub async fn handle_start_query(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QueryStarted>, ApiError> {
    Ok(Json(state.workflow.start_query(id).await?))
}

/// POST /v1/workflows/:id/query/check — Poll the query execution once.
pub async fn handle_check_query(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StepStatus>, ApiError> {
    Ok(Json(state.workflow.check_query(id).await?))
}

/// POST /v1/workflows/:id/import — Import the query output into the segment.
pub async fn handle_start_import(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImportStarted>, ApiError> {
    Ok(Json(state.workflow.start_import(id).await?))
}

/// POST /v1/workflows/:id/import/check — Poll the import job once.
pub async fn handle_check_import(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StepStatus>, ApiError> {
    Ok(Json(state.workflow.check_import(id).await?))
}

/// POST /v1/workflows/:id/tag — Tag the imported segment for re-engagement.
pub async fn handle_tag(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowRecord>, ApiError> {
    Ok(Json(state.workflow.tag(id).await?))
}
