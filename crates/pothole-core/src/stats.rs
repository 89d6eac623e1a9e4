//! Aggregate verification statistics over the complaint collection.

use serde::Serialize;

use crate::complaint::{Complaint, Severity, VerificationState};

/// Low/medium/high tallies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Distribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl Distribution {
    fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStats {
    pub total_complaints: usize,
    pub ml_verified_complaints: usize,
    pub ml_pending_complaints: usize,
    pub ml_failed_complaints: usize,
    /// Verifications left mid-run by an external worker.
    pub ml_processing_complaints: usize,
    /// Verified share of all complaints, as a rounded percentage.
    pub ml_verification_rate: u32,
    /// Severity of verified complaints only.
    pub severity_distribution: Distribution,
    /// Confidence of verified complaints: ≥0.9 high, ≥0.7 medium, else low.
    pub confidence_distribution: Distribution,
    pub detection_records: usize,
}

pub fn summarize(complaints: &[Complaint], detection_records: usize) -> VerificationStats {
    let mut stats = VerificationStats {
        total_complaints: complaints.len(),
        detection_records,
        ..Default::default()
    };

    for v in complaints.iter().filter_map(|c| c.ml_verification.as_ref()) {
        if v.pending {
            stats.ml_pending_complaints += 1;
        }
        match v.status {
            VerificationState::Failed => stats.ml_failed_complaints += 1,
            VerificationState::Processing => stats.ml_processing_complaints += 1,
            VerificationState::Pending | VerificationState::Completed => {}
        }
        if v.verified {
            stats.ml_verified_complaints += 1;
            stats.severity_distribution.add(v.severity);
            stats.confidence_distribution.add(confidence_bucket(v.confidence));
        }
    }

    if stats.total_complaints > 0 {
        let rate = stats.ml_verified_complaints as f64 / stats.total_complaints as f64 * 100.0;
        stats.ml_verification_rate = rate.round() as u32;
    }
    stats
}

fn confidence_bucket(confidence: f64) -> Severity {
    if confidence >= 0.9 {
        Severity::High
    } else if confidence >= 0.7 {
        Severity::Medium
    } else {
        Severity::Low
    }
}
