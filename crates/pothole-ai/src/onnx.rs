//! ONNX Runtime pothole detector for YOLOv8 exports.
//!
//! Expects a single-input model (`images`, `[1, 3, S, S]` float RGB in
//! `[0, 1]`) exported with `yolo export format=onnx`.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use crate::detector::{DetectError, Detection, Detector};
use crate::yolo::{self, Letterbox, OutputLayout, PAD_VALUE};

const DEFAULT_INPUT_SIZE: u32 = 640;

/// YOLOv8 object detector backed by ONNX Runtime.
pub struct OnnxDetector {
    // `Session::run` needs `&mut`; detection is called through `&self`.
    session: Mutex<Session>,
    input_size: u32,
    /// Fixed when the model declares a fully static output shape.
    layout: Option<OutputLayout>,
    name: String,
}

impl OnnxDetector {
    /// Load a YOLOv8 ONNX model from `model_path`.
    pub fn load(model_path: &Path) -> anyhow::Result<Self> {
        anyhow::ensure!(model_path.exists(), "model not found at {model_path:?}");

        let session = Session::builder()?.commit_from_file(model_path)?;

        // Infer the square input size from the model's declared input shape.
        let input_size = infer_input_size(session.inputs()[0].dtype()).unwrap_or(DEFAULT_INPUT_SIZE);
        let layout = infer_layout(session.outputs()[0].dtype());

        let name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        info!(input_size, ?layout, model = %model_path.display(), "loaded detection model");
        Ok(Self {
            session: Mutex::new(session),
            input_size,
            layout,
            name,
        })
    }

    fn run(&self, image: &Path) -> anyhow::Result<Vec<Detection>> {
        let (input, letterbox) = preprocess(image, self.input_size)?;
        let size = self.input_size as i64;
        let tensor = Tensor::from_array(([1i64, 3, size, size], input.into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("detector session lock poisoned"))?;
        let outputs = session.run(ort::inputs!["images" => tensor])?;

        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        let layout = self.layout.unwrap_or_else(|| OutputLayout::infer(dims));
        let detections = yolo::decode(output_data, dims, layout, &letterbox)?;
        debug!(candidates = detections.len(), "decoded model output");
        Ok(detections)
    }
}

impl Detector for OnnxDetector {
    fn detect(&self, image: &Path) -> Result<Vec<Detection>, DetectError> {
        self.run(image).map_err(DetectError::Inference)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Decode an image file and letterbox it into a CHW float buffer.
fn preprocess(path: &Path, size: u32) -> anyhow::Result<(Vec<f32>, Letterbox)> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| anyhow::anyhow!("decode {}: {e}", path.display()))?;

    let letterbox = Letterbox::fit(img.width(), img.height(), size);
    let resized = img
        .resize_exact(letterbox.scaled_w, letterbox.scaled_h, FilterType::Triangle)
        .to_rgb8();

    let plane = (size * size) as usize;
    let mut input = vec![PAD_VALUE; 3 * plane];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = ((y + letterbox.pad_y) * size + (x + letterbox.pad_x)) as usize;
        for c in 0..3 {
            input[c * plane + offset] = pixel[c] as f32 / 255.0;
        }
    }
    Ok((input, letterbox))
}

/// Read the spatial size from a `[N, 3, H, W]` input declaration.
fn infer_input_size(input_type: &ort::value::ValueType) -> Option<u32> {
    match input_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as u32) } else { None }),
        _ => None,
    }
}

/// Output layout from a declared `[1, A, B]` shape, if every dim is static.
fn infer_layout(output_type: &ort::value::ValueType) -> Option<OutputLayout> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => {
            let dims: &[i64] = shape;
            if dims.len() == 3 && dims.iter().all(|&d| d > 0) {
                Some(OutputLayout::infer(dims))
            } else {
                None
            }
        }
        _ => None,
    }
}
