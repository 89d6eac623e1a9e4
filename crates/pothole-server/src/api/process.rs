//! Processing endpoints: the whole collection or one complaint.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pothole_core::{Severity, Verdict};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::ApiError;
use crate::AppState;
use crate::pipeline::{ProcessError, process_one};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedEntry {
    pub complaint_id: String,
    pub status: Verdict,
    pub pothole_count: u32,
}

#[derive(Debug, Serialize)]
pub struct ProcessAllResponse {
    pub message: &'static str,
    pub inserted: Vec<ProcessedEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessComplaintResponse {
    pub message: &'static str,
    pub complaint_id: String,
    pub status: Verdict,
    pub pothole_count: u32,
    pub verified: bool,
    pub confidence: f64,
    pub analysis: String,
    pub severity: Severity,
}

/// GET /process_all
///
/// Processes every complaint with an image reference, one at a time.
/// Complaints without an image, or whose download fails, are left out of
/// the result. A store failure aborts the run with 500.
pub async fn process_all(State(state): State<AppState>) -> Result<Response, ApiError> {
    let complaints = state.store.list_complaints().await?;
    if complaints.is_empty() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No complaints found" })),
        )
            .into_response());
    }

    let mut inserted = Vec::new();
    for complaint in &complaints {
        let Some(url) = complaint.image_ref() else {
            continue;
        };
        match process_one(&state, complaint, url).await {
            Ok(assessment) => inserted.push(ProcessedEntry {
                complaint_id: complaint.id.clone(),
                status: assessment.verdict,
                pothole_count: assessment.pothole_count,
            }),
            Err(ProcessError::Download(e)) => {
                warn!(complaint = %complaint.id, error = %e, "skipping complaint, image download failed");
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        total = complaints.len(),
        processed = inserted.len(),
        "bulk processing finished"
    );
    Ok(Json(ProcessAllResponse {
        message: "All complaints processed, potholes inserted and statuses updated",
        inserted,
    })
    .into_response())
}

/// GET /process_complaint/:id
pub async fn process_complaint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcessComplaintResponse>, ApiError> {
    let complaint = state
        .store
        .get_complaint(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Complaint not found".into()))?;

    let url = complaint
        .image_ref()
        .ok_or_else(|| ApiError::BadRequest("No image URL found for complaint".into()))?;

    let assessment = process_one(&state, &complaint, url).await?;

    Ok(Json(ProcessComplaintResponse {
        message: "Complaint processed successfully",
        complaint_id: id,
        status: assessment.verdict,
        pothole_count: assessment.pothole_count,
        verified: assessment.verified,
        confidence: assessment.confidence,
        analysis: assessment.analysis,
        severity: assessment.severity,
    }))
}
