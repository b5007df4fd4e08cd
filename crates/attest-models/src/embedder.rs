//! ArcFace face embedder and the embedding-distance comparison engine.
//!
//! Embeddings are 512-dimensional, L2-normalized; the comparison engine
//! fulfils the `FaceComparator` contract with cosine distance
//! (`1 − cosine similarity`), which is 0 for identical embeddings and
//! non-negative throughout.

use crate::detector::FaceDetector;
use crate::ModelError;
use attest_core::{CompareError, FaceComparator};
use image::imageops::FilterType;
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const EMB_INPUT_SIZE: u32 = 112;
const EMB_MEAN: f32 = 127.5;
const EMB_STD: f32 = 127.5; // symmetric normalization, unlike the detector
const EMB_DIM: usize = 512;

pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    /// Load the ArcFace ONNX model.
    pub fn load(model_path: &Path) -> Result<Self, ModelError> {
        if !model_path.exists() {
            return Err(ModelError::NotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "loaded face embedding model");
        Ok(Self { session })
    }

    /// Embed a face crop into an L2-normalized 512-dim vector.
    pub fn embed(&mut self, crop: &GrayImage) -> Result<Vec<f32>, ModelError> {
        let input = preprocess(crop);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != EMB_DIM {
            return Err(ModelError::InferenceFailed(format!(
                "expected {EMB_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(l2_normalize(raw))
    }
}

/// Resize to the canonical 112×112 input and normalize to a NCHW tensor,
/// replicating the grayscale channel across RGB.
fn preprocess(crop: &GrayImage) -> Array4<f32> {
    let resized = image::imageops::resize(crop, EMB_INPUT_SIZE, EMB_INPUT_SIZE, FilterType::Triangle);
    let size = EMB_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let normalized = (pixel.0[0] as f32 - EMB_MEAN) / EMB_STD;
        tensor[[0, 0, y as usize, x as usize]] = normalized;
        tensor[[0, 1, y as usize, x as usize]] = normalized;
        tensor[[0, 2, y as usize, x as usize]] = normalized;
    }
    tensor
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}

/// Cosine distance between two embeddings: `1 − cosine similarity`,
/// clamped below at 0 against floating point drift.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    let similarity = if denom > 0.0 { dot / denom } else { 0.0 };
    (1.0 - similarity).max(0.0)
}

/// Embedding-distance engine behind the `FaceComparator` contract.
///
/// Runs its own face detection on each input and embeds the best face
/// crop; an input with no detectable face is embedded whole, which keeps
/// the uncropped video-frame path working.
pub struct FaceComparisonEngine {
    detector: FaceDetector,
    embedder: FaceEmbedder,
}

impl FaceComparisonEngine {
    pub fn new(detector: FaceDetector, embedder: FaceEmbedder) -> Self {
        Self { detector, embedder }
    }

    fn embed_best_face(&mut self, image: &GrayImage) -> Result<Vec<f32>, ModelError> {
        let crop = self
            .detector
            .detect(image)?
            .first()
            .and_then(|face| face.crop(image));
        match crop {
            Some(face) => self.embedder.embed(&face),
            None => {
                tracing::debug!("no face found in comparison input; embedding whole image");
                self.embedder.embed(image)
            }
        }
    }
}

impl FaceComparator for FaceComparisonEngine {
    fn distance(&mut self, reference: &GrayImage, probe: &GrayImage) -> Result<f32, CompareError> {
        let a = self
            .embed_best_face(reference)
            .map_err(|e| CompareError(e.to_string()))?;
        let b = self
            .embed_best_face(probe)
            .map_err(|e| CompareError(e.to_string()))?;
        Ok(cosine_distance(&a, &b))
    }
}
