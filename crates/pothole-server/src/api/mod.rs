//! HTTP API handlers.

pub mod error;
pub mod health;
pub mod process;
pub mod requeue;
pub mod root;
pub mod stats;

pub use error::ApiError;
pub use health::health_routes;
pub use process::{process_all, process_complaint};
pub use requeue::requeue;
pub use root::root;
pub use stats::ml_stats;
