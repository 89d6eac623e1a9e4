pub mod complaint;
pub mod rules;
pub mod stats;

pub use complaint::{Complaint, DetectionRecord, Severity, Verification, VerificationState};
pub use rules::{Assessment, MAX_CONFIDENCE, Verdict, assess};
pub use stats::{Distribution, VerificationStats, summarize};
