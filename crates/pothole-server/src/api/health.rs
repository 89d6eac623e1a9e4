//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::AppState;

/// Store reachability and model status.
///
/// `mongodb_connected` reports whichever store backend is configured.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: String,
    pub model_loaded: bool,
    pub mongodb_connected: bool,
    pub timestamp: String,
}

/// GET /health
///
/// 200 only when the store answers and the detector model is loaded.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let model_loaded = state.detector.is_loaded();
    let store = state.store.ping().await;

    let (code, status, message, connected) = match (store, model_loaded) {
        (Ok(()), true) => (
            StatusCode::OK,
            "healthy",
            "Pothole detection model is running".to_string(),
            true,
        ),
        (Ok(()), false) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "unhealthy",
            "Detection model not loaded".to_string(),
            true,
        ),
        (Err(e), _) => {
            warn!(error = %e, "store ping failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "unhealthy",
                format!("Health check failed: {e}"),
                false,
            )
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            message,
            model_loaded,
            mongodb_connected: connected,
            timestamp: Utc::now().to_rfc3339(),
        }),
    )
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
