//! Detection layer: object detectors and the adapter that turns their output into a pothole count.

mod detector;
pub use detector::{
    BoundingBox, DETECTION_THRESHOLD, DetectError, Detection, Detector, PotholeDetector,
    count_potholes,
};

#[cfg(any(feature = "onnx", test))]
mod yolo;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::OnnxDetector;
