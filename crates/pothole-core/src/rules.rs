//! Verification rules: map a pothole count to a status, confidence and severity.
//!
//! The thresholds are fixed business rules and are not derived from the
//! detector's own box confidences.
//!
//! # Rules
//!
//! | count | status       | verified | confidence                 | severity |
//! |-------|--------------|----------|----------------------------|----------|
//! | 0     | Not Accepted | false    | 0.0                        | low      |
//! | 1     | Accepted     | true     | 0.8                        | low      |
//! | 2     | Accepted     | true     | 0.9                        | medium   |
//! | n > 2 | Accepted     | true     | min(0.7 + 0.1 × n, 0.95)   | high     |

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::complaint::{Severity, Verification, VerificationState};

/// Upper bound on the synthetic confidence.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Complaint status written back after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Not Accepted")]
    NotAccepted,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::NotAccepted => "Not Accepted",
        }
    }
}

/// Outcome of applying the rules to one count.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub pothole_count: u32,
    pub verdict: Verdict,
    pub verified: bool,
    pub confidence: f64,
    pub severity: Severity,
    pub analysis: String,
}

impl Assessment {
    /// The completed verification sub-record for this assessment.
    pub fn to_verification(&self, verified_at: DateTime<Utc>) -> Verification {
        Verification {
            verified: self.verified,
            confidence: self.confidence,
            analysis: Some(self.analysis.clone()),
            severity: self.severity,
            pending: false,
            verified_at: Some(verified_at),
            status: VerificationState::Completed,
        }
    }
}

/// Apply the verification rules to a pothole count.
pub fn assess(count: u32) -> Assessment {
    let verified = count > 0;
    let severity = severity_for(count);
    Assessment {
        pothole_count: count,
        verdict: if verified {
            Verdict::Accepted
        } else {
            Verdict::NotAccepted
        },
        verified,
        confidence: confidence_for(count),
        severity,
        analysis: analysis_for(count, severity),
    }
}

/// `min(0.7 + 0.1 × count, 0.95)` for a positive count, else zero.
///
/// Computed in tenths so that 1 and 2 land exactly on 0.8 and 0.9.
pub fn confidence_for(count: u32) -> f64 {
    if count == 0 {
        return 0.0;
    }
    ((7.0 + f64::from(count)) / 10.0).min(MAX_CONFIDENCE)
}

/// count > 2 → high, count > 1 → medium, otherwise low (including zero).
pub fn severity_for(count: u32) -> Severity {
    if count > 2 {
        Severity::High
    } else if count > 1 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn analysis_for(count: u32, severity: Severity) -> String {
    if count == 0 {
        return "Model did not detect any potholes in the image.".to_string();
    }
    match severity {
        Severity::High => format!(
            "Model detected {count} potholes. Multiple potholes requiring immediate attention."
        ),
        Severity::Medium => format!(
            "Model detected {count} potholes. Moderate severity requiring attention within 24 hours."
        ),
        Severity::Low => {
            format!("Model detected {count} pothole. Low severity requiring attention.")
        }
    }
}
