//! Detector abstraction and the pothole-counting adapter.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

/// A detection counts toward the pothole tally only above this confidence.
pub const DETECTION_THRESHOLD: f32 = 0.5;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("image error: {0}")]
    Image(String),
    #[error("inference failed: {0}")]
    Inference(#[from] anyhow::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Axis-aligned box in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union with `other`.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }
}

/// One detected object.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    /// In `[0, 1]`.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// An object-detection model that runs on a local image file.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &Path) -> Result<Vec<Detection>, DetectError>;

    /// Short model identifier for logs and health output.
    fn name(&self) -> &str;
}

/// Number of detections whose confidence strictly exceeds `threshold`.
pub fn count_potholes(detections: &[Detection], threshold: f32) -> u32 {
    detections
        .iter()
        .filter(|d| d.confidence > threshold)
        .count() as u32
}

/// Wraps an optional [`Detector`] and reduces its output to a pothole count.
///
/// A missing model and any per-image failure both yield zero, so callers
/// always get a count to write back.
pub struct PotholeDetector {
    inner: Option<Box<dyn Detector>>,
    threshold: f32,
}

impl PotholeDetector {
    pub fn new(detector: Box<dyn Detector>) -> Self {
        Self {
            inner: Some(detector),
            threshold: DETECTION_THRESHOLD,
        }
    }

    /// An adapter with no model; every count is zero.
    pub fn unavailable() -> Self {
        Self {
            inner: None,
            threshold: DETECTION_THRESHOLD,
        }
    }

    /// Load the ONNX model at `model_path`.
    ///
    /// A missing or unloadable model is logged and yields an unloaded
    /// adapter rather than an error.
    pub fn load(model_path: &Path) -> Self {
        #[cfg(feature = "onnx")]
        {
            match crate::OnnxDetector::load(model_path) {
                Ok(detector) => Self::new(Box::new(detector)),
                Err(e) => {
                    warn!(model = %model_path.display(), error = %e, "failed to load detector model");
                    Self::unavailable()
                }
            }
        }
        #[cfg(not(feature = "onnx"))]
        {
            warn!(model = %model_path.display(), "built without the onnx feature; detector unavailable");
            Self::unavailable()
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.is_some()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.inner.as_ref().map(|d| d.name())
    }

    /// Count potholes in the image at `image`, absorbing every failure to zero.
    pub fn count(&self, image: &Path) -> u32 {
        let Some(detector) = &self.inner else {
            warn!("detector not loaded, skipping detection");
            return 0;
        };
        match detector.detect(image) {
            Ok(detections) => {
                let count = count_potholes(&detections, self.threshold);
                info!(
                    count,
                    candidates = detections.len(),
                    model = detector.name(),
                    "detected potential potholes"
                );
                count
            }
            Err(e) => {
                warn!(error = %e, image = %image.display(), "detection failed, counting zero");
                0
            }
        }
    }
}
