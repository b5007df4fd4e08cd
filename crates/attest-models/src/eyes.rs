//! Open-eye state classifier via ONNX Runtime.
//!
//! Classifies small eye crops as open or closed. The liveness pass asks
//! "how many open eyes are in this face region": a face with zero open
//! eyes in a frame is counted as a blink event.

use crate::ModelError;
use attest_core::{DetectError, FaceBox, OpenEyeDetector};
use image::imageops::FilterType;
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const EYE_INPUT_SIZE: u32 = 24;
/// Softmax probability above which an eye counts as open.
const EYE_OPEN_THRESHOLD: f32 = 0.5;
/// Eye crop side length as a fraction of the face width.
const EYE_CROP_RATIO: f32 = 0.35;

pub struct EyeStateClassifier {
    session: Session,
}

impl EyeStateClassifier {
    /// Load the eye-state ONNX model (1×1×24×24 in, [closed, open] logits out).
    pub fn load(model_path: &Path) -> Result<Self, ModelError> {
        if !model_path.exists() {
            return Err(ModelError::NotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "loaded eye-state model");
        Ok(Self { session })
    }

    /// Probability that the eye in `crop` is open.
    fn open_probability(&mut self, crop: &GrayImage) -> Result<f32, ModelError> {
        let input = preprocess(crop);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("eye state: {e}")))?;
        if logits.len() < 2 {
            return Err(ModelError::InferenceFailed(format!(
                "expected [closed, open] logits, got {} values",
                logits.len()
            )));
        }

        Ok(softmax2(logits[0], logits[1]))
    }
}

impl OpenEyeDetector for EyeStateClassifier {
    fn count_open_eyes(&mut self, image: &GrayImage, face: &FaceBox) -> Result<u32, DetectError> {
        let mut open = 0u32;
        for region in eye_regions(face) {
            let Some(crop) = region.crop(image) else {
                continue;
            };
            let p = self
                .open_probability(&crop)
                .map_err(|e| DetectError(e.to_string()))?;
            if p >= EYE_OPEN_THRESHOLD {
                open += 1;
            }
        }
        Ok(open)
    }
}

/// Two square regions expected to contain the eyes of `face`.
///
/// Uses the detector's eye landmarks when present; otherwise falls back
/// to fixed positions in the upper face half.
fn eye_regions(face: &FaceBox) -> [FaceBox; 2] {
    let side = (face.width * EYE_CROP_RATIO).max(4.0);
    let centers = match face.landmarks {
        Some(lms) => [lms[0], lms[1]],
        None => [
            (face.x + face.width * 0.30, face.y + face.height * 0.38),
            (face.x + face.width * 0.70, face.y + face.height * 0.38),
        ],
    };
    centers.map(|(cx, cy)| FaceBox {
        x: cx - side / 2.0,
        y: cy - side / 2.0,
        width: side,
        height: side,
        confidence: face.confidence,
        landmarks: None,
    })
}

/// Normalize an eye crop into a 1×1×24×24 tensor scaled to [0, 1].
fn preprocess(crop: &GrayImage) -> Array4<f32> {
    let resized = image::imageops::resize(crop, EYE_INPUT_SIZE, EYE_INPUT_SIZE, FilterType::Triangle);
    let size = EYE_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 1, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        tensor[[0, 0, y as usize, x as usize]] = pixel.0[0] as f32 / 255.0;
    }
    tensor
}

/// Probability of the second class under a 2-way softmax.
fn softmax2(a: f32, b: f32) -> f32 {
    let m = a.max(b);
    let ea = (a - m).exp();
    let eb = (b - m).exp();
    eb / (ea + eb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax2_symmetric() {
        assert!((softmax2(0.0, 0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_softmax2_dominant() {
        assert!(softmax2(-5.0, 5.0) > 0.99);
        assert!(softmax2(5.0, -5.0) < 0.01);
    }

    #[test]
    fn test_softmax2_large_values_stable() {
        let p = softmax2(1000.0, 1001.0);
        assert!(p.is_finite());
        assert!(p > 0.5);
    }

    #[test]
    fn test_preprocess_shape_and_scale() {
        let crop = GrayImage::from_pixel(10, 10, image::Luma([255]));
        let tensor = preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 1, 24, 24]);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_eye_regions_from_landmarks() {
        let face = FaceBox {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            confidence: 0.9,
            landmarks: Some([(30.0, 40.0), (70.0, 40.0), (50.0, 60.0), (35.0, 80.0), (65.0, 80.0)]),
        };
        let [left, right] = eye_regions(&face);
        let side = 100.0 * EYE_CROP_RATIO;
        assert!((left.x - (30.0 - side / 2.0)).abs() < 1e-4);
        assert!((left.width - side).abs() < 1e-4);
        assert!((right.x - (70.0 - side / 2.0)).abs() < 1e-4);
    }

    #[test]
    fn test_eye_regions_fallback_in_upper_half() {
        let face = FaceBox {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 100.0,
            confidence: 0.9,
            landmarks: None,
        };
        for region in eye_regions(&face) {
            let cy = region.y + region.height / 2.0;
            assert!(cy < face.y + face.height / 2.0, "eye region must sit in the upper face half");
        }
    }

    #[test]
    fn test_eye_regions_minimum_size() {
        let face = FaceBox {
            x: 0.0,
            y: 0.0,
            width: 5.0,
            height: 5.0,
            confidence: 0.9,
            landmarks: None,
        };
        for region in eye_regions(&face) {
            assert!(region.width >= 4.0);
        }
    }
}
