//! SCRFD frontal-face detector via ONNX Runtime.
//!
//! 3-stride anchor-free decoding with NMS post-processing. Implements the
//! `FaceLocator` contract for both the document-face extraction path and
//! the per-frame liveness pass.

use crate::ModelError;
use attest_core::{DetectError, FaceBox, FaceLocator};
use image::imageops::FilterType;
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const DET_INPUT_SIZE: u32 = 640;
const DET_MEAN: f32 = 127.5;
const DET_STD: f32 = 128.0;
const DET_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DET_NMS_THRESHOLD: f32 = 0.4;
const DET_STRIDES: [u32; 3] = [8, 16, 32];
const DET_ANCHORS_PER_CELL: u32 = 2;
/// Output tensor layout: [0-2] scores, [3-5] bboxes, [6-8] landmarks,
/// each ordered by stride 8/16/32.
const DET_OUTPUT_COUNT: usize = 9;

/// Mapping back from letterboxed input space to source image space.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

pub struct FaceDetector {
    session: Session,
}

impl FaceDetector {
    /// Load the SCRFD ONNX model.
    pub fn load(model_path: &Path) -> Result<Self, ModelError> {
        if !model_path.exists() {
            return Err(ModelError::NotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        if num_outputs != DET_OUTPUT_COUNT {
            return Err(ModelError::InferenceFailed(format!(
                "face detector requires {DET_OUTPUT_COUNT} outputs (3 strides × score/bbox/kps), got {num_outputs}"
            )));
        }

        tracing::info!(path = %model_path.display(), "loaded face detection model");
        Ok(Self { session })
    }

    /// Detect faces, returning boxes sorted by confidence, best first.
    pub fn detect(&mut self, image: &GrayImage) -> Result<Vec<FaceBox>, ModelError> {
        let (input, letterbox) = preprocess(image);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();
        for (stride_pos, &stride) in DET_STRIDES.iter().enumerate() {
            let (_, scores) = outputs[stride_pos]
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[3 + stride_pos]
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            let (_, kps) = outputs[6 + stride_pos]
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            decode_stride(scores, bboxes, kps, stride, &letterbox, &mut detections);
        }

        let mut kept = suppress_overlaps(detections, DET_NMS_THRESHOLD);
        kept.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(kept)
    }
}

impl FaceLocator for FaceDetector {
    fn locate(&mut self, image: &GrayImage) -> Result<Vec<FaceBox>, DetectError> {
        self.detect(image).map_err(|e| DetectError(e.to_string()))
    }
}

/// Letterbox-resize into the square model input and normalize to a NCHW
/// tensor, replicating the grayscale channel across RGB.
fn preprocess(image: &GrayImage) -> (Array4<f32>, Letterbox) {
    let (width, height) = image.dimensions();
    let side = DET_INPUT_SIZE;
    let scale = (side as f32 / width as f32).min(side as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, side);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, side);

    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let pad_x = (side - new_w) as f32 / 2.0;
    let pad_y = (side - new_h) as f32 / 2.0;
    let x0 = pad_x.floor() as u32;
    let y0 = pad_y.floor() as u32;

    // Zeros are the normalized value of DET_MEAN, so padding stays neutral.
    let mut tensor = Array4::<f32>::zeros((1, 3, side as usize, side as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let normalized = (pixel.0[0] as f32 - DET_MEAN) / DET_STD;
        let (tx, ty) = ((x0 + x) as usize, (y0 + y) as usize);
        tensor[[0, 0, ty, tx]] = normalized;
        tensor[[0, 1, ty, tx]] = normalized;
        tensor[[0, 2, ty, tx]] = normalized;
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

/// Decode one stride level of anchor-free outputs into face boxes in
/// source-image coordinates.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: u32,
    letterbox: &Letterbox,
    out: &mut Vec<FaceBox>,
) {
    let grid = (DET_INPUT_SIZE / stride) as usize;
    let num_anchors = grid * grid * DET_ANCHORS_PER_CELL as usize;
    let unmap = |v: f32, pad: f32| (v - pad) / letterbox.scale;

    for idx in 0..num_anchors {
        let Some(&score) = scores.get(idx) else { break };
        if score <= DET_CONFIDENCE_THRESHOLD {
            continue;
        }

        let cell = idx / DET_ANCHORS_PER_CELL as usize;
        let anchor_cx = ((cell % grid) * stride as usize) as f32;
        let anchor_cy = ((cell / grid) * stride as usize) as f32;

        let b = idx * 4;
        if b + 3 >= bboxes.len() {
            continue;
        }
        // Offsets are [left, top, right, bottom] distances in stride units.
        let x1 = unmap(anchor_cx - bboxes[b] * stride as f32, letterbox.pad_x);
        let y1 = unmap(anchor_cy - bboxes[b + 1] * stride as f32, letterbox.pad_y);
        let x2 = unmap(anchor_cx + bboxes[b + 2] * stride as f32, letterbox.pad_x);
        let y2 = unmap(anchor_cy + bboxes[b + 3] * stride as f32, letterbox.pad_y);

        let k = idx * 10;
        let landmarks = if k + 9 < kps.len() {
            let mut lms = [(0.0f32, 0.0f32); 5];
            for (i, lm) in lms.iter_mut().enumerate() {
                *lm = (
                    unmap(anchor_cx + kps[k + i * 2] * stride as f32, letterbox.pad_x),
                    unmap(anchor_cy + kps[k + i * 2 + 1] * stride as f32, letterbox.pad_y),
                );
            }
            Some(lms)
        } else {
            None
        };

        out.push(FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }
}

/// Non-maximum suppression over overlapping detections.
fn suppress_overlaps(mut detections: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<FaceBox> = Vec::new();
    for candidate in detections {
        if kept.iter().all(|k| overlap_ratio(k, &candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Intersection-over-union of two face boxes.
fn overlap_ratio(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
