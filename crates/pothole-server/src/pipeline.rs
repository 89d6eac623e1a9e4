//! Per-complaint processing: download → count → assess → write back.

use std::sync::Arc;

use chrono::Utc;
use pothole_ai::PotholeDetector;
use pothole_core::{Assessment, Complaint, DetectionRecord, assess};
use pothole_fetch::{FetchError, FetchedImage};
use pothole_store::StoreError;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::AppState;

/// Why one complaint could not be processed.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to download image: {0}")]
    Download(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Run the full pipeline for `complaint` using the image at `image_url`.
///
/// Once a count is known both writes happen, even for a zero count: the
/// complaint's verification is overwritten and a new detection record is
/// appended with a snapshot of `complaint` as read before the update.
pub async fn process_one(
    state: &AppState,
    complaint: &Complaint,
    image_url: &str,
) -> Result<Assessment, ProcessError> {
    // 1. Download into a scratch file; it is removed when `image` drops.
    let image = state.fetcher.fetch(image_url).await?;

    // 2. Count potholes off the reactor. An empty body cannot hold any.
    let count = if image.is_empty() {
        warn!(complaint = %complaint.id, url = image_url, "downloaded image is empty, counting zero");
        0
    } else {
        debug!(complaint = %complaint.id, bytes = image.len(), "running detection");
        count_blocking(Arc::clone(&state.detector), image).await
    };

    // 3. Apply the verification rules.
    let assessment = assess(count);

    // 4. Write back.
    let now = Utc::now();
    let updated = state
        .store
        .update_verification(
            &complaint.id,
            assessment.verdict.as_str(),
            &assessment.to_verification(now),
            now,
        )
        .await?;
    if !updated {
        warn!(complaint = %complaint.id, "complaint disappeared before its verification was written");
    }
    state
        .store
        .insert_detection(&DetectionRecord::new(complaint, count, now))
        .await?;

    info!(
        complaint = %complaint.id,
        count,
        status = assessment.verdict.as_str(),
        severity = assessment.severity.as_str(),
        "complaint processed"
    );
    Ok(assessment)
}

/// Run inference on the blocking pool. The scratch file is dropped there,
/// after inference, whether or not it succeeded.
async fn count_blocking(detector: Arc<PotholeDetector>, image: FetchedImage) -> u32 {
    let task = tokio::task::spawn_blocking(move || detector.count(image.path()));
    match task.await {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "detection task failed, counting zero");
            0
        }
    }
}
