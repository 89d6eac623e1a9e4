use axum::Json;
use chrono::Utc;
use serde::Serialize;

/// Liveness banner.
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub endpoints: &'static [&'static str],
    pub timestamp: String,
}

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Pothole verification server",
        status: "running",
        endpoints: &[
            "/health",
            "/process_all",
            "/process_complaint/{id}",
            "/ml_stats",
            "/requeue/{id}",
        ],
        timestamp: Utc::now().to_rfc3339(),
    })
}
