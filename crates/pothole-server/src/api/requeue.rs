use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use super::ApiError;
use crate::AppState;

/// POST /requeue/:id
///
/// Resets the complaint's verification to pending. Detection records are
/// left alone.
pub async fn requeue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.store.reset_verification(&id, Utc::now()).await? {
        return Err(ApiError::NotFound("Complaint not found".into()));
    }
    info!(complaint = %id, "complaint requeued");
    Ok(Json(json!({
        "message": "Complaint requeued for verification",
        "complaintId": id,
    })))
}
