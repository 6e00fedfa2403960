//! SCRFD face detector via ONNX Runtime.
//!
//! Anchor-free decoding over three strides followed by NMS. The detector input
//! resolution follows [`DetectionMode`]: the fast mode trades small-face recall
//! for a quarter of the pixels.

use crate::types::{BoundingBox, DetectionMode};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("empty frame")]
    EmptyFrame,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Mapping from letterboxed detector space back to frame space.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Output tensor indices for one stride: (score, bbox, kps).
type StrideOutputs = (usize, usize, usize);

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    input_size: usize,
    stride_outputs: [StrideOutputs; 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model.
    pub fn load(model_path: &str, mode: DetectionMode) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides x score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let stride_outputs = map_stride_outputs(&output_names);
        tracing::info!(
            path = model_path,
            ?mode,
            input_size = mode.input_size(),
            ?stride_outputs,
            "loaded SCRFD model"
        );

        Ok(Self {
            session,
            input_size: mode.input_size(),
            stride_outputs,
        })
    }

    /// Detect faces in an RGB frame, most confident first.
    pub fn detect(&mut self, frame: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(DetectorError::EmptyFrame);
        }

        let (input, letterbox) = letterbox_tensor(frame, self.input_size);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (slot, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_outputs[slot];
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}")))
            };
            let scores = extract(score_idx, "scores")?;
            let bboxes = extract(bbox_idx, "bboxes")?;
            let kps = extract(kps_idx, "kps")?;

            candidates.extend(decode_stride(
                scores,
                bboxes,
                kps,
                stride,
                self.input_size,
                &letterbox,
                SCRFD_CONFIDENCE_THRESHOLD,
            ));
        }

        let faces = nms(candidates, SCRFD_NMS_THRESHOLD);
        tracing::debug!(faces = faces.len(), "SCRFD detection complete");
        Ok(faces)
    }
}

/// Resize `frame` to fit a `size` square, centre it, and normalize into NCHW.
fn letterbox_tensor(frame: &RgbImage, size: usize) -> (Array4<f32>, Letterbox) {
    let (width, height) = (frame.width() as f32, frame.height() as f32);
    let scale = (size as f32 / width).min(size as f32 / height);
    let new_w = ((width * scale).round() as u32).clamp(1, size as u32);
    let new_h = ((height * scale).round() as u32).clamp(1, size as u32);
    let pad_x = (size as u32 - new_w) as f32 / 2.0;
    let pad_y = (size as u32 - new_h) as f32 / 2.0;

    let resized = imageops::resize(frame, new_w, new_h, FilterType::Triangle);

    // Padding is zero after normalization, i.e. SCRFD_MEAN in pixel space.
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    let (x_off, y_off) = (pad_x.floor() as usize, pad_y.floor() as usize);
    for (x, y, px) in resized.enumerate_pixels() {
        let (tx, ty) = (x as usize + x_off, y as usize + y_off);
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (px[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

/// Map output tensors to stride slots.
///
/// Exports with named outputs (`score_8`, `bbox_16`, `kps_32`, ...) are mapped
/// by name; anonymous exports use the conventional positional layout
/// `[scores 8/16/32, bboxes 8/16/32, kps 8/16/32]`.
fn map_stride_outputs(names: &[String]) -> [StrideOutputs; 3] {
    let find = |prefix: &str, stride: usize| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let mut named = [(0usize, 0usize, 0usize); 3];
    for (slot, &stride) in SCRFD_STRIDES.iter().enumerate() {
        match (find("score", stride), find("bbox", stride), find("kps", stride)) {
            (Some(s), Some(b), Some(k)) => named[slot] = (s, b, k),
            _ => {
                tracing::debug!(?names, "SCRFD outputs unnamed, using positional mapping");
                return [(0, 3, 6), (1, 4, 7), (2, 5, 8)];
            }
        }
    }
    named
}

/// Decode detections above `threshold` for one stride level.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    input_size: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<BoundingBox> {
    let grid = input_size / stride;
    let anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
    let s = stride as f32;

    let mut out = Vec::new();
    for idx in 0..anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }
        let Some(dist) = bboxes.get(idx * 4..idx * 4 + 4) else {
            continue;
        };

        let cell = idx / SCRFD_ANCHORS_PER_CELL;
        let ax = (cell % grid) as f32 * s;
        let ay = (cell / grid) as f32 * s;

        let (x1, y1) = letterbox.to_frame(ax - dist[0] * s, ay - dist[1] * s);
        let (x2, y2) = letterbox.to_frame(ax + dist[2] * s, ay + dist[3] * s);

        let landmarks = kps.get(idx * 10..idx * 10 + 10).map(|k| {
            std::array::from_fn(|i| letterbox.to_frame(ax + k[i * 2] * s, ay + k[i * 2 + 1] * s))
        });

        out.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }
    out
}

/// Greedy non-maximum suppression; output is sorted by confidence descending.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<BoundingBox> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| iou(k, &det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

/// Intersection-over-union of two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter_w = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let inter_h = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
