//! Pothole verification service: fetches complaint photos, counts potholes
//! with the detection model and writes the verdict back to the store.

use std::sync::Arc;

use axum::Router;
use pothole_ai::PotholeDetector;
use pothole_fetch::ImageFetcher;
use pothole_store::ComplaintStore;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod commands;
pub mod config;
pub mod pipeline;

/// Shared dependencies, built once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ComplaintStore>,
    pub detector: Arc<PotholeDetector>,
    pub fetcher: Arc<ImageFetcher>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ComplaintStore>,
        detector: PotholeDetector,
        fetcher: ImageFetcher,
    ) -> Self {
        Self {
            store,
            detector: Arc::new(detector),
            fetcher: Arc::new(fetcher),
        }
    }
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/", get(api::root))
        .merge(api::health_routes())
        .route("/process_all", get(api::process_all))
        .route("/process_complaint/:id", get(api::process_complaint))
        .route("/ml_stats", get(api::ml_stats))
        .route("/requeue/:id", post(api::requeue))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
