//! Integration tests for the verification API.
//!
//! Each test drives the router with `oneshot`, backed by an in-memory store,
//! a scripted detector and a local image server.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use chrono::{DateTime, Utc};
use pothole_ai::{BoundingBox, DetectError, Detection, Detector, PotholeDetector};
use pothole_core::{Complaint, DetectionRecord, Verification, VerificationState};
use pothole_fetch::ImageFetcher;
use pothole_server::{AppState, build_router};
use pothole_store::{ComplaintStore, MemoryStore, StoreError};
use serde_json::Value;
use tower::util::ServiceExt;

const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

// =============================================================================
// Test doubles
// =============================================================================

/// Returns `confidences.len()` detections and records every path it was given.
struct Scripted {
    confidences: Vec<f32>,
    fail: bool,
    seen: Arc<Mutex<Vec<PathBuf>>>,
}

impl Detector for Scripted {
    fn detect(&self, image: &Path) -> Result<Vec<Detection>, DetectError> {
        assert!(image.exists(), "scratch file missing during detection");
        self.seen.lock().unwrap().push(image.to_path_buf());
        if self.fail {
            return Err(DetectError::Image("corrupt image".into()));
        }
        Ok(self
            .confidences
            .iter()
            .map(|&confidence| Detection {
                class_id: 0,
                confidence,
                bbox: BoundingBox {
                    x1: 0.0,
                    y1: 0.0,
                    x2: 10.0,
                    y2: 10.0,
                },
            })
            .collect())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A store whose every operation fails.
struct DownStore;

#[async_trait]
impl ComplaintStore for DownStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Other("connection refused".into()))
    }

    async fn list_complaints(&self) -> Result<Vec<Complaint>, StoreError> {
        Err(StoreError::Other("connection refused".into()))
    }

    async fn get_complaint(&self, _id: &str) -> Result<Option<Complaint>, StoreError> {
        Err(StoreError::Other("connection refused".into()))
    }

    async fn insert_complaint(&self, _complaint: &Complaint) -> Result<(), StoreError> {
        Err(StoreError::Other("connection refused".into()))
    }

    async fn update_verification(
        &self,
        _id: &str,
        _status: &str,
        _verification: &Verification,
        _updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Other("connection refused".into()))
    }

    async fn insert_detection(&self, _record: &DetectionRecord) -> Result<(), StoreError> {
        Err(StoreError::Other("connection refused".into()))
    }

    async fn detections_for(&self, _id: &str) -> Result<Vec<DetectionRecord>, StoreError> {
        Err(StoreError::Other("connection refused".into()))
    }

    async fn detection_count(&self) -> Result<usize, StoreError> {
        Err(StoreError::Other("connection refused".into()))
    }
}

// =============================================================================
// Helpers
// =============================================================================

struct Harness {
    state: AppState,
    store: Arc<MemoryStore>,
    seen: Arc<Mutex<Vec<PathBuf>>>,
    scratch: tempfile::TempDir,
}

impl Harness {
    /// Detector reports one detection per entry of `confidences`.
    async fn new(complaints: Vec<Complaint>, confidences: &[f32]) -> Self {
        Self::build(complaints, confidences.to_vec(), false).await
    }

    async fn failing_detector(complaints: Vec<Complaint>) -> Self {
        Self::build(complaints, Vec::new(), true).await
    }

    async fn build(complaints: Vec<Complaint>, confidences: Vec<f32>, fail: bool) -> Self {
        let images = serve_images().await;
        let complaints = complaints
            .into_iter()
            .map(|mut c| {
                c.image_url = c.image_url.map(|u| u.replace("{images}", &images));
                c
            })
            .collect();

        let store = Arc::new(MemoryStore::with_complaints(complaints));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let detector = PotholeDetector::new(Box::new(Scripted {
            confidences,
            fail,
            seen: Arc::clone(&seen),
        }));
        let scratch = tempfile::TempDir::new().unwrap();
        let fetcher = ImageFetcher::new(Duration::from_secs(5), scratch.path()).unwrap();
        let state = AppState::new(store.clone(), detector, fetcher);

        Self {
            state,
            store,
            seen,
            scratch,
        }
    }

    fn app(&self) -> Router {
        build_router(self.state.clone())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        send(self.app(), "GET", uri).await
    }

    async fn post(&self, uri: &str) -> (StatusCode, Value) {
        send(self.app(), "POST", uri).await
    }

    fn scratch_files(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}

/// A complaint whose image is served by the harness image server.
fn with_image(id: &str, file: &str) -> Complaint {
    Complaint::new(id, Some(format!("{{images}}/{file}")))
}

async fn serve_images() -> String {
    let router = Router::new()
        .route("/pothole.jpg", get(|| async { JPEG_BYTES.to_vec() }))
        .route("/empty.jpg", get(|| async { Vec::<u8>::new() }))
        .route("/missing.jpg", get(|| async { StatusCode::NOT_FOUND }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// =============================================================================
// Root and health
// =============================================================================

#[tokio::test]
async fn root_reports_running() {
    let h = Harness::new(vec![], &[]).await;
    let (status, body) = h.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert!(body["endpoints"].as_array().unwrap().len() >= 2);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn health_ok_when_store_and_model_ready() {
    let h = Harness::new(vec![], &[]).await;
    let (status, body) = h.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["mongodb_connected"], true);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn health_fails_without_model() {
    let scratch = tempfile::TempDir::new().unwrap();
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        PotholeDetector::unavailable(),
        ImageFetcher::new(Duration::from_secs(1), scratch.path()).unwrap(),
    );
    let (status, body) = send(build_router(state), "GET", "/health").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["mongodb_connected"], true);
}

#[tokio::test]
async fn health_fails_when_store_unreachable() {
    let scratch = tempfile::TempDir::new().unwrap();
    let state = AppState::new(
        Arc::new(DownStore),
        PotholeDetector::unavailable(),
        ImageFetcher::new(Duration::from_secs(1), scratch.path()).unwrap(),
    );
    let (status, body) = send(build_router(state), "GET", "/health").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["mongodb_connected"], false);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("connection refused")
    );
}

// =============================================================================
// Bulk processing
// =============================================================================

#[tokio::test]
async fn process_all_empty_collection_is_not_found() {
    let h = Harness::new(vec![], &[0.9]).await;
    let (status, body) = h.get("/process_all").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No complaints found");
}

#[tokio::test]
async fn process_all_skips_missing_images_and_failed_downloads() {
    let h = Harness::new(
        vec![
            with_image("a", "pothole.jpg"),
            Complaint::new("b", None),
            Complaint::new("c", Some("   ".into())),
            with_image("d", "missing.jpg"),
        ],
        &[0.9, 0.8],
    )
    .await;

    let (status, body) = h.get("/process_all").await;
    assert_eq!(status, StatusCode::OK);
    let inserted = body["inserted"].as_array().unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0]["complaintId"], "a");
    assert_eq!(inserted[0]["status"], "Accepted");
    assert_eq!(inserted[0]["potholeCount"], 2);

    assert_eq!(h.store.detection_count().await.unwrap(), 1);
    for id in ["b", "c", "d"] {
        let c = h.store.get_complaint(id).await.unwrap().unwrap();
        assert!(c.ml_verification.is_none(), "{id} should be untouched");
        assert_eq!(c.status, "Pending");
    }
}

#[tokio::test]
async fn process_all_writes_verification() {
    let h = Harness::new(
        vec![with_image("a", "pothole.jpg"), with_image("b", "pothole.jpg")],
        &[0.9, 0.8, 0.7, 0.2],
    )
    .await;

    let (status, body) = h.get("/process_all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inserted"].as_array().unwrap().len(), 2);

    let a = h.store.get_complaint("a").await.unwrap().unwrap();
    assert_eq!(a.status, "Accepted");
    let v = a.ml_verification.unwrap();
    assert!(v.verified);
    assert!(!v.pending);
    assert_eq!(v.status, VerificationState::Completed);
    assert_eq!(v.confidence, 0.95);
    assert_eq!(v.severity.as_str(), "high");
    assert!(v.verified_at.is_some());
    assert_eq!(
        v.analysis.as_deref(),
        Some("Model detected 3 potholes. Multiple potholes requiring immediate attention.")
    );
}

#[tokio::test]
async fn process_all_store_failure_is_server_error() {
    let scratch = tempfile::TempDir::new().unwrap();
    let state = AppState::new(
        Arc::new(DownStore),
        PotholeDetector::unavailable(),
        ImageFetcher::new(Duration::from_secs(1), scratch.path()).unwrap(),
    );
    let (status, body) = send(build_router(state), "GET", "/process_all").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "connection refused");
}

// =============================================================================
// Single complaint
// =============================================================================

#[tokio::test]
async fn process_complaint_returns_assessment() {
    let h = Harness::new(vec![with_image("a", "pothole.jpg")], &[0.95, 0.6]).await;

    let (status, body) = h.get("/process_complaint/a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Complaint processed successfully");
    assert_eq!(body["complaintId"], "a");
    assert_eq!(body["status"], "Accepted");
    assert_eq!(body["potholeCount"], 2);
    assert_eq!(body["verified"], true);
    assert_eq!(body["confidence"], 0.9);
    assert_eq!(body["severity"], "medium");
    assert_eq!(
        body["analysis"],
        "Model detected 2 potholes. Moderate severity requiring attention within 24 hours."
    );
}

#[tokio::test]
async fn process_complaint_with_no_detections_still_writes() {
    let h = Harness::new(vec![with_image("a", "pothole.jpg")], &[0.5, 0.1]).await;

    let (status, body) = h.get("/process_complaint/a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Not Accepted");
    assert_eq!(body["potholeCount"], 0);
    assert_eq!(body["verified"], false);
    assert_eq!(body["confidence"], 0.0);
    assert_eq!(body["severity"], "low");
    assert_eq!(body["analysis"], "Model did not detect any potholes in the image.");

    let a = h.store.get_complaint("a").await.unwrap().unwrap();
    assert_eq!(a.status, "Not Accepted");
    let records = h.store.detections_for("a").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pothole_count, 0);
}

#[tokio::test]
async fn reprocessing_appends_records_but_keeps_one_verification() {
    let h = Harness::new(vec![with_image("a", "pothole.jpg")], &[0.9]).await;

    assert_eq!(h.get("/process_complaint/a").await.0, StatusCode::OK);
    assert_eq!(h.get("/process_complaint/a").await.0, StatusCode::OK);

    let records = h.store.detections_for("a").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_ne!(records[0].id, records[1].id);
    assert!(records.iter().all(|r| r.id != "a" && r.complaint_id == "a"));

    // First snapshot predates any verification, second carries the first run's.
    assert!(records[0].complaint.ml_verification.is_none());
    assert!(records[1].complaint.ml_verification.is_some());

    let complaints = h.store.list_complaints().await.unwrap();
    assert_eq!(complaints.len(), 1);
    assert_eq!(complaints[0].status, "Accepted");
}

#[tokio::test]
async fn process_complaint_unknown_id_is_not_found_without_mutation() {
    let h = Harness::new(vec![with_image("a", "pothole.jpg")], &[0.9]).await;
    let before = h.store.list_complaints().await.unwrap();

    let (status, body) = h.get("/process_complaint/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Complaint not found");

    assert_eq!(h.store.list_complaints().await.unwrap(), before);
    assert_eq!(h.store.detection_count().await.unwrap(), 0);
    assert!(h.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn process_complaint_without_image_is_bad_request() {
    let h = Harness::new(vec![Complaint::new("a", None)], &[0.9]).await;
    let (status, body) = h.get("/process_complaint/a").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image URL found for complaint");
    assert_eq!(h.store.detection_count().await.unwrap(), 0);
}

#[tokio::test]
async fn process_complaint_download_failure_is_bad_request() {
    let h = Harness::new(vec![with_image("a", "missing.jpg")], &[0.9]).await;
    let (status, body) = h.get("/process_complaint/a").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to download image:")
    );
    assert_eq!(h.store.detection_count().await.unwrap(), 0);
    assert_eq!(h.scratch_files(), 0);
}

#[tokio::test]
async fn detector_error_counts_zero_and_cleans_scratch() {
    let h = Harness::failing_detector(vec![with_image("a", "pothole.jpg")]).await;

    let (status, body) = h.get("/process_complaint/a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["potholeCount"], 0);
    assert_eq!(body["status"], "Not Accepted");

    let seen = h.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with(h.scratch.path()));
    assert!(!seen[0].exists());
    assert_eq!(h.scratch_files(), 0);
}

#[tokio::test]
async fn empty_image_counts_zero_without_detection() {
    let h = Harness::new(vec![with_image("a", "empty.jpg")], &[0.9, 0.9]).await;

    let (status, body) = h.get("/process_complaint/a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["potholeCount"], 0);
    assert_eq!(body["status"], "Not Accepted");

    assert!(h.seen.lock().unwrap().is_empty());
    assert_eq!(h.store.detection_count().await.unwrap(), 1);
    assert_eq!(h.scratch_files(), 0);
}

#[tokio::test]
async fn scratch_files_removed_after_bulk_run() {
    let h = Harness::new(
        vec![with_image("a", "pothole.jpg"), with_image("b", "pothole.jpg")],
        &[0.9],
    )
    .await;
    assert_eq!(h.get("/process_all").await.0, StatusCode::OK);

    let seen = h.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_ne!(seen[0], seen[1]);
    assert!(seen.iter().all(|p| !p.exists()));
    assert_eq!(h.scratch_files(), 0);
}

#[tokio::test]
async fn unloaded_model_still_processes_with_zero() {
    let images = serve_images().await;
    let store = Arc::new(MemoryStore::with_complaints(vec![Complaint::new(
        "a",
        Some(format!("{images}/pothole.jpg")),
    )]));
    let scratch = tempfile::TempDir::new().unwrap();
    let state = AppState::new(
        store.clone(),
        PotholeDetector::unavailable(),
        ImageFetcher::new(Duration::from_secs(5), scratch.path()).unwrap(),
    );

    let (status, body) = send(build_router(state), "GET", "/process_complaint/a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["potholeCount"], 0);
    assert_eq!(store.detection_count().await.unwrap(), 1);
}

// =============================================================================
// Stats and requeue
// =============================================================================

#[tokio::test]
async fn ml_stats_summarizes_collection() {
    let h = Harness::new(
        vec![
            with_image("a", "pothole.jpg"),
            with_image("b", "pothole.jpg"),
            Complaint::new("c", None),
        ],
        &[0.9],
    )
    .await;
    assert_eq!(h.get("/process_all").await.0, StatusCode::OK);

    let (status, body) = h.get("/ml_stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalComplaints"], 3);
    assert_eq!(body["mlVerifiedComplaints"], 2);
    assert_eq!(body["mlPendingComplaints"], 0);
    assert_eq!(body["mlProcessingComplaints"], 0);
    assert_eq!(body["mlVerificationRate"], 67);
    assert_eq!(body["severityDistribution"]["low"], 2);
    assert_eq!(body["confidenceDistribution"]["medium"], 2);
    assert_eq!(body["detectionRecords"], 2);
}

#[tokio::test]
async fn requeue_resets_verification_and_keeps_records() {
    let h = Harness::new(vec![with_image("a", "pothole.jpg")], &[0.9]).await;
    assert_eq!(h.get("/process_complaint/a").await.0, StatusCode::OK);

    let (status, body) = h.post("/requeue/a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["complaintId"], "a");

    let a = h.store.get_complaint("a").await.unwrap().unwrap();
    let v = a.ml_verification.unwrap();
    assert!(v.pending);
    assert!(!v.verified);
    assert_eq!(v.status, VerificationState::Pending);
    assert!(v.analysis.is_none());
    assert!(v.verified_at.is_none());
    assert_eq!(h.store.detection_count().await.unwrap(), 1);

    let (_, stats) = h.get("/ml_stats").await;
    assert_eq!(stats["mlPendingComplaints"], 1);
}

#[tokio::test]
async fn requeue_unknown_id_is_not_found() {
    let h = Harness::new(vec![], &[]).await;
    let (status, body) = h.post("/requeue/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Complaint not found");
}

#[tokio::test]
async fn requeue_requires_post() {
    let h = Harness::new(vec![with_image("a", "pothole.jpg")], &[]).await;
    let response = h
        .app()
        .oneshot(
            Request::builder()
                .uri("/requeue/a")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
