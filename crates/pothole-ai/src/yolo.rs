//! YOLOv8 output decoding: letterbox geometry, box decoding and NMS.
//!
//! A YOLOv8 ONNX export takes a `[1, 3, S, S]` RGB tensor and returns
//! `[1, 4 + classes, anchors]`, where rows 0..4 are `cx, cy, w, h` in
//! input-pixel space and the remaining rows are per-class scores. Some
//! re-exports transpose this to `[1, anchors, 4 + classes]`.

use crate::detector::{BoundingBox, Detection};

/// Candidates below this score are dropped before NMS.
pub const CANDIDATE_SCORE: f32 = 0.25;

/// Overlap above which a lower-scored box of the same class is suppressed.
pub const NMS_IOU: f32 = 0.7;

/// Letterbox fill value (114/255, the YOLO convention).
pub const PAD_VALUE: f32 = 114.0 / 255.0;

/// How a source image was scaled and padded into the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub size: u32,
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub scaled_w: u32,
    pub scaled_h: u32,
}

impl Letterbox {
    /// Fit a `width × height` image inside a `size × size` square, centred.
    pub fn fit(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width.max(1) as f32).min(size as f32 / height.max(1) as f32);
        let scaled_w = ((width as f32 * scale).round() as u32).clamp(1, size);
        let scaled_h = ((height as f32 * scale).round() as u32).clamp(1, size);
        Self {
            size,
            scale,
            pad_x: (size - scaled_w) / 2,
            pad_y: (size - scaled_h) / 2,
            scaled_w,
            scaled_h,
        }
    }

    /// Map a box from model-input space back to source-image space.
    fn unmap(&self, cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
        let x = |v: f32| (v - self.pad_x as f32) / self.scale;
        let y = |v: f32| (v - self.pad_y as f32) / self.scale;
        BoundingBox {
            x1: x(cx - w / 2.0),
            y1: y(cy - h / 2.0),
            x2: x(cx + w / 2.0),
            y2: y(cy + h / 2.0),
        }
    }
}

/// Memory order of a YOLOv8 output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[1, 4 + classes, anchors]`, the ultralytics export default.
    AttributesFirst,
    /// `[1, anchors, 4 + classes]`, produced by some re-exports.
    AnchorsFirst,
}

impl OutputLayout {
    /// Guess the layout from a concrete or declared output shape.
    ///
    /// Attributes-first unless the trailing dim can hold a box plus at least
    /// one class score and the middle dim is larger. Non-positive (dynamic)
    /// dims never vote for anchors-first.
    pub fn infer(dims: &[i64]) -> Self {
        match dims {
            [_, a, b] if *b > 4 && *a > *b => Self::AnchorsFirst,
            _ => Self::AttributesFirst,
        }
    }
}

/// Decode a raw YOLOv8 output tensor into detections, then apply NMS.
///
/// `dims` is the tensor shape, laid out as described by `layout`.
pub fn decode(
    output: &[f32],
    dims: &[i64],
    layout: OutputLayout,
    letterbox: &Letterbox,
) -> anyhow::Result<Vec<Detection>> {
    anyhow::ensure!(
        dims.len() == 3 && dims[0] == 1 && dims[1] > 0 && dims[2] > 0,
        "unexpected output shape: {dims:?}"
    );
    let (a, b) = (dims[1] as usize, dims[2] as usize);
    anyhow::ensure!(output.len() == a * b, "output length {} does not match shape {dims:?}", output.len());

    let transposed = layout == OutputLayout::AnchorsFirst;
    let (attrs, anchors) = if transposed { (b, a) } else { (a, b) };
    anyhow::ensure!(attrs > 4, "output has no class scores: {dims:?}");

    let at = |attr: usize, anchor: usize| {
        if transposed {
            output[anchor * attrs + attr]
        } else {
            output[attr * anchors + anchor]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..attrs)
            .map(|attr| (attr - 4, at(attr, anchor)))
            .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
        if score < CANDIDATE_SCORE {
            continue;
        }
        candidates.push(Detection {
            class_id,
            confidence: score.clamp(0.0, 1.0),
            bbox: letterbox.unmap(at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor)),
        });
    }

    Ok(nms(candidates, NMS_IOU))
}

/// Greedy per-class non-maximum suppression, highest confidence first.
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == det.class_id && k.bbox.iou(&det.bbox) > iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}
