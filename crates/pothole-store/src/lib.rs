//! Storage layer: the `complaints` collection (updated in place) and the
//! `potholes` collection (append-only detection records).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pothole_core::{Complaint, DetectionRecord, Verification};

mod error;
mod memory;
pub use error::StoreError;
pub use memory::MemoryStore;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

/// Persistence for complaints and their detection history.
///
/// Implementations are shared across request handlers behind an `Arc`.
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// Cheap reachability check used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;

    /// All complaints, in insertion order.
    async fn list_complaints(&self) -> Result<Vec<Complaint>, StoreError>;

    async fn get_complaint(&self, id: &str) -> Result<Option<Complaint>, StoreError>;

    /// Insert a new complaint. Fails with [`StoreError::Duplicate`] if the id exists.
    async fn insert_complaint(&self, complaint: &Complaint) -> Result<(), StoreError>;

    /// Overwrite a complaint's status and verification sub-record.
    ///
    /// Returns `false` if no complaint has this id.
    async fn update_verification(
        &self,
        id: &str,
        status: &str,
        verification: &Verification,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Append a detection record. Records are never updated afterwards.
    async fn insert_detection(&self, record: &DetectionRecord) -> Result<(), StoreError>;

    /// Detection records for one complaint, oldest first.
    async fn detections_for(&self, complaint_id: &str)
    -> Result<Vec<DetectionRecord>, StoreError>;

    /// Total number of detection records.
    async fn detection_count(&self) -> Result<usize, StoreError>;

    /// Reset a complaint's verification to pending, keeping its status label.
    ///
    /// Returns `false` if no complaint has this id.
    async fn reset_verification(
        &self,
        id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let Some(complaint) = self.get_complaint(id).await? else {
            return Ok(false);
        };
        self.update_verification(
            id,
            &complaint.status,
            &Verification::requeued(),
            updated_at,
        )
        .await
    }
}
