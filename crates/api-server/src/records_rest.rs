//! Delivery-stream transformation endpoint.

use axum::extract::State;
use axum::Json;
use reengage_export::{TransformationRequest, TransformationResponse};

use crate::rest::AppState;

/// POST /v1/records/convert — Convert one batch of exported records.
///
/// Always answers 200; malformed records come back as `ProcessingFailed`.
pub async fn handle_convert(
    State(state): State<AppState>,
    Json(request): Json<TransformationRequest>,
) -> Json<TransformationResponse> {
    Json(state.transformer.convert(&request))
}
