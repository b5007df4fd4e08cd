//! Contracts required from the external analysis engines.
//!
//! OCR, face detection, eye detection, and face comparison are opaque
//! collaborators: the pipeline specifies their inputs, outputs, and
//! failure signals here and nothing else. Concrete implementations live
//! in `attest-models` / `attest-media`; tests substitute mocks.

use image::GrayImage;
use thiserror::Error;

/// Region of a detected face, with optional facial landmarks.
#[derive(Debug, Clone)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceBox {
    /// Crop this region out of `image`, clamped to the image bounds.
    ///
    /// Returns `None` when the clamped region is degenerate (zero area).
    pub fn crop(&self, image: &GrayImage) -> Option<GrayImage> {
        let (iw, ih) = image.dimensions();
        let x0 = self.x.max(0.0) as u32;
        let y0 = self.y.max(0.0) as u32;
        if x0 >= iw || y0 >= ih {
            return None;
        }
        let x1 = ((self.x + self.width).max(0.0) as u32).min(iw);
        let y1 = ((self.y + self.height).max(0.0) as u32).min(ih);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(image::imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image())
    }
}

#[derive(Debug, Error)]
#[error("ocr backend: {0}")]
pub struct OcrError(pub String);

#[derive(Debug, Error)]
#[error("detector backend: {0}")]
pub struct DetectError(pub String);

#[derive(Debug, Error)]
#[error("face comparator: {0}")]
pub struct CompareError(pub String);

#[derive(Debug, Error)]
#[error("frame stream: {0}")]
pub struct FrameStreamError(pub String);

/// Text extraction from a document region. An unreadable region is an
/// `Err`; the pipeline degrades it to empty text rather than aborting.
pub trait TextRecognizer {
    fn recognize(&mut self, region: &GrayImage) -> Result<String, OcrError>;
}

/// Frontal-face detection. An empty result means "no face found" and is
/// never an error.
pub trait FaceLocator {
    fn locate(&mut self, image: &GrayImage) -> Result<Vec<FaceBox>, DetectError>;
}

/// Count of open eyes detected inside one face region. Zero open eyes in
/// a frame where a face was found is what the liveness pass counts as a
/// blink event.
pub trait OpenEyeDetector {
    fn count_open_eyes(&mut self, image: &GrayImage, face: &FaceBox) -> Result<u32, DetectError>;
}

/// Embedding-distance comparison of two face images.
///
/// Returns a non-negative distance where 0 means identical. Failures here
/// are operational problems and surface to the caller as a typed
/// face-matching error instead of folding into the verdict.
pub trait FaceComparator {
    fn distance(&mut self, reference: &GrayImage, probe: &GrayImage) -> Result<f32, CompareError>;
}

/// Sequential, non-restartable stream of grayscale video frames.
pub trait FrameSource {
    /// Next frame in sequence order, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<GrayImage>, FrameStreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(w: u32, h: u32) -> GrayImage {
        GrayImage::new(w, h)
    }

    fn face(x: f32, y: f32, w: f32, h: f32) -> FaceBox {
        FaceBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
            landmarks: None,
        }
    }

    #[test]
    fn test_crop_inside_bounds() {
        let img = gray(100, 80);
        let crop = face(10.0, 20.0, 30.0, 40.0).crop(&img).unwrap();
        assert_eq!(crop.dimensions(), (30, 40));
    }

    #[test]
    fn test_crop_clamps_to_image() {
        let img = gray(100, 80);
        let crop = face(90.0, 70.0, 50.0, 50.0).crop(&img).unwrap();
        assert_eq!(crop.dimensions(), (10, 10));
    }

    #[test]
    fn test_crop_negative_origin() {
        let img = gray(100, 80);
        let crop = face(-5.0, -5.0, 20.0, 20.0).crop(&img).unwrap();
        assert_eq!(crop.dimensions(), (15, 15));
    }

    #[test]
    fn test_crop_outside_bounds_is_none() {
        let img = gray(100, 80);
        assert!(face(200.0, 10.0, 30.0, 30.0).crop(&img).is_none());
    }

    #[test]
    fn test_crop_degenerate_is_none() {
        let img = gray(100, 80);
        assert!(face(10.0, 10.0, 0.0, 0.0).crop(&img).is_none());
    }
}
