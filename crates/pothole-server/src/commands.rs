//! Maintenance commands that run against the store without the HTTP server.

use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use pothole_core::Complaint;
use pothole_store::{ComplaintStore, StoreError};
use tracing::{info, warn};

/// Insert every complaint from a JSON array file. Existing ids are skipped.
///
/// Returns the number of complaints inserted.
pub async fn import_complaints(store: &dyn ComplaintStore, file: &Path) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let complaints: Vec<Complaint> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing complaints from {}", file.display()))?;

    let mut inserted = 0;
    for complaint in &complaints {
        match store.insert_complaint(complaint).await {
            Ok(()) => inserted += 1,
            Err(StoreError::Duplicate(id)) => warn!(complaint = %id, "already present, skipping"),
            Err(e) => return Err(anyhow::Error::new(e).context("inserting complaint")),
        }
    }
    info!(inserted, total = complaints.len(), "imported complaints");
    Ok(inserted)
}

/// Reset one complaint's verification so the next run reprocesses it.
pub async fn requeue_complaint(store: &dyn ComplaintStore, id: &str) -> anyhow::Result<()> {
    let found = store
        .reset_verification(id, Utc::now())
        .await
        .context("resetting verification")?;
    anyhow::ensure!(found, "complaint not found: {id}");
    info!(complaint = %id, "complaint requeued");
    Ok(())
}
