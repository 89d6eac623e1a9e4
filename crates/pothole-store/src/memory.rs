//! In-process store for tests and runs without a database file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pothole_core::{Complaint, DetectionRecord, Verification};
use tokio::sync::RwLock;

use crate::{ComplaintStore, StoreError};

#[derive(Default)]
struct Collections {
    complaints: Vec<Complaint>,
    potholes: Vec<DetectionRecord>,
}

/// Ephemeral store; contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `complaints`.
    pub fn with_complaints(complaints: Vec<Complaint>) -> Self {
        Self {
            inner: RwLock::new(Collections {
                complaints,
                potholes: Vec::new(),
            }),
        }
    }
}

#[async_trait]
impl ComplaintStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_complaints(&self) -> Result<Vec<Complaint>, StoreError> {
        Ok(self.inner.read().await.complaints.clone())
    }

    async fn get_complaint(&self, id: &str) -> Result<Option<Complaint>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.complaints.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_complaint(&self, complaint: &Complaint) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.complaints.iter().any(|c| c.id == complaint.id) {
            return Err(StoreError::Duplicate(complaint.id.clone()));
        }
        inner.complaints.push(complaint.clone());
        Ok(())
    }

    async fn update_verification(
        &self,
        id: &str,
        status: &str,
        verification: &Verification,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(complaint) = inner.complaints.iter_mut().find(|c| c.id == id) else {
            return Ok(false);
        };
        complaint.status = status.to_string();
        complaint.ml_verification = Some(verification.clone());
        complaint.updated_at = Some(updated_at);
        Ok(true)
    }

    async fn insert_detection(&self, record: &DetectionRecord) -> Result<(), StoreError> {
        self.inner.write().await.potholes.push(record.clone());
        Ok(())
    }

    async fn detections_for(
        &self,
        complaint_id: &str,
    ) -> Result<Vec<DetectionRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .potholes
            .iter()
            .filter(|r| r.complaint_id == complaint_id)
            .cloned()
            .collect())
    }

    async fn detection_count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.potholes.len())
    }
}
