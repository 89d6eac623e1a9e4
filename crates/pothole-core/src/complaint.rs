//! Complaint and detection record types shared by the store and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status label a complaint carries before it has been processed.
pub const DEFAULT_STATUS: &str = "Pending";

/// Severity tier derived from the pothole count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Lifecycle of the machine verification embedded in a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// The latest machine-derived assessment of a complaint (`mlVerification`).
///
/// A complaint holds at most one of these; reprocessing overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub verified: bool,
    pub confidence: f64,
    /// Absent after a requeue until the next run completes.
    pub analysis: Option<String>,
    pub severity: Severity,
    pub pending: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub status: VerificationState,
}

impl Verification {
    /// The state a requeued complaint is reset to.
    pub fn requeued() -> Self {
        Self {
            verified: false,
            confidence: 0.0,
            analysis: None,
            severity: Severity::Low,
            pending: true,
            verified_at: None,
            status: VerificationState::Pending,
        }
    }
}

/// A citizen-submitted complaint referencing a road-defect photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_department")]
    pub department: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub ml_verification: Option<Verification>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_department() -> String {
    "General".to_string()
}

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

impl Complaint {
    /// A fresh, unprocessed complaint.
    pub fn new(id: impl Into<String>, image_url: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            location: String::new(),
            department: default_department(),
            image_url,
            status: default_status(),
            ml_verification: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// The image reference, if present and not blank.
    pub fn image_ref(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Append-only record of one processing run (`potholes` collection).
///
/// Carries a snapshot of the complaint as it was read before the update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
    pub id: String,
    pub complaint_id: String,
    pub complaint: Complaint,
    pub pothole_count: u32,
    pub detected_at: DateTime<Utc>,
}

impl DetectionRecord {
    /// Snapshot `complaint` under a freshly generated identifier.
    pub fn new(complaint: &Complaint, pothole_count: u32, detected_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            complaint_id: complaint.id.clone(),
            complaint: complaint.clone(),
            pothole_count,
            detected_at,
        }
    }
}
