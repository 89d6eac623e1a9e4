use axum::Json;
use axum::extract::State;
use pothole_core::{VerificationStats, summarize};

use super::ApiError;
use crate::AppState;

/// GET /ml_stats
pub async fn ml_stats(State(state): State<AppState>) -> Result<Json<VerificationStats>, ApiError> {
    let complaints = state.store.list_complaints().await?;
    let records = state.store.detection_count().await?;
    Ok(Json(summarize(&complaints, records)))
}
