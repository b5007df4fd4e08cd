//! Document analysis: framing, OCR, document-face extraction.
//!
//! Framing follows the classic scan: binarize the grayscale image with a
//! fixed intensity threshold, take the largest bright connected region as
//! the document boundary, and crop to its bounding rectangle. Finding no
//! region is a recognized "document not detected" outcome, never an error.

use crate::contracts::{FaceLocator, TextRecognizer};
use crate::types::StageOutcome;
use image::GrayImage;

/// Fixed binarization threshold: pixels strictly above count as document.
pub const DEFAULT_BINARIZE_THRESHOLD: u8 = 150;

/// Bounding rectangle of the largest bright connected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Locate the document region and crop to its bounding rectangle.
///
/// Returns `None` when no pixel exceeds the threshold.
pub fn locate_document(image: &GrayImage, threshold: u8) -> Option<GrayImage> {
    let rect = largest_bright_region(image, threshold)?;
    Some(image::imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image())
}

/// OCR over a located document region, degraded to empty text on failure.
pub fn extract_text(region: &GrayImage, ocr: &mut dyn TextRecognizer) -> String {
    match ocr.recognize(region) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "ocr failed; continuing with empty text");
            String::new()
        }
    }
}

/// Extract the first detected face from a document region.
///
/// Takes the first face only — multi-face documents are not
/// disambiguated.
pub fn extract_face(region: &GrayImage, faces: &mut dyn FaceLocator) -> StageOutcome<GrayImage> {
    match faces.locate(region) {
        Ok(detections) => match detections.first().and_then(|f| f.crop(region)) {
            Some(crop) => StageOutcome::Found(crop),
            None => StageOutcome::NotFound,
        },
        Err(err) => {
            tracing::warn!(error = %err, "face detection failed on document region");
            StageOutcome::Errored(err.to_string())
        }
    }
}

/// Flood-fill labeling over the binarized mask, keeping the bounding
/// rectangle of the region with the largest pixel area.
fn largest_bright_region(image: &GrayImage, threshold: u8) -> Option<Rect> {
    let (width, height) = image.dimensions();
    let w = width as usize;
    let h = height as usize;
    if w == 0 || h == 0 {
        return None;
    }

    let data = image.as_raw();
    let mut visited = vec![false; w * h];
    let mut best: Option<(usize, Rect)> = None;
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start_y in 0..h {
        for start_x in 0..w {
            let idx = start_y * w + start_x;
            if visited[idx] || data[idx] <= threshold {
                continue;
            }

            // Grow one connected region (4-connectivity).
            let mut area = 0usize;
            let (mut min_x, mut max_x) = (start_x, start_x);
            let (mut min_y, mut max_y) = (start_y, start_y);
            visited[idx] = true;
            stack.push((start_x, start_y));

            while let Some((x, y)) = stack.pop() {
                area += 1;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);

                let mut push = |nx: usize, ny: usize, stack: &mut Vec<(usize, usize)>| {
                    let nidx = ny * w + nx;
                    if !visited[nidx] && data[nidx] > threshold {
                        visited[nidx] = true;
                        stack.push((nx, ny));
                    }
                };

                if x > 0 {
                    push(x - 1, y, &mut stack);
                }
                if x + 1 < w {
                    push(x + 1, y, &mut stack);
                }
                if y > 0 {
                    push(x, y - 1, &mut stack);
                }
                if y + 1 < h {
                    push(x, y + 1, &mut stack);
                }
            }

            let rect = Rect {
                x: min_x as u32,
                y: min_y as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
            };
            if best.as_ref().map_or(true, |(best_area, _)| area > *best_area) {
                best = Some((area, rect));
            }
        }
    }

    best.map(|(_, rect)| rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{DetectError, FaceBox, OcrError};

    fn canvas(w: u32, h: u32, base: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, image::Luma([base]))
    }

    fn paint(img: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32, value: u8) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, image::Luma([value]));
            }
        }
    }

    struct FixedOcr(Result<String, OcrError>);
    impl TextRecognizer for FixedOcr {
        fn recognize(&mut self, _: &GrayImage) -> Result<String, OcrError> {
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(OcrError(e.0.clone())),
            }
        }
    }

    struct FixedFaces(Result<Vec<FaceBox>, DetectError>);
    impl FaceLocator for FixedFaces {
        fn locate(&mut self, _: &GrayImage) -> Result<Vec<FaceBox>, DetectError> {
            match &self.0 {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(DetectError(e.0.clone())),
            }
        }
    }

    #[test]
    fn test_locate_document_single_region() {
        let mut img = canvas(20, 20, 0);
        paint(&mut img, 3, 4, 6, 5, 200);
        let region = locate_document(&img, DEFAULT_BINARIZE_THRESHOLD).unwrap();
        assert_eq!(region.dimensions(), (6, 5));
    }

    #[test]
    fn test_locate_document_picks_largest_region() {
        let mut img = canvas(30, 30, 0);
        paint(&mut img, 1, 1, 3, 3, 255);
        paint(&mut img, 10, 10, 12, 8, 255);
        let region = locate_document(&img, DEFAULT_BINARIZE_THRESHOLD).unwrap();
        assert_eq!(region.dimensions(), (12, 8));
    }

    #[test]
    fn test_locate_document_dark_image_is_none() {
        let img = canvas(16, 16, 40);
        assert!(locate_document(&img, DEFAULT_BINARIZE_THRESHOLD).is_none());
    }

    #[test]
    fn test_threshold_is_strict() {
        // Pixels exactly at the threshold do not count as document.
        let img = canvas(8, 8, DEFAULT_BINARIZE_THRESHOLD);
        assert!(locate_document(&img, DEFAULT_BINARIZE_THRESHOLD).is_none());
        let img = canvas(8, 8, DEFAULT_BINARIZE_THRESHOLD + 1);
        assert!(locate_document(&img, DEFAULT_BINARIZE_THRESHOLD).is_some());
    }

    #[test]
    fn test_extract_text_degrades_on_ocr_failure() {
        let region = canvas(10, 10, 200);
        let mut ocr = FixedOcr(Err(OcrError("tesseract exploded".into())));
        assert_eq!(extract_text(&region, &mut ocr), "");
    }

    #[test]
    fn test_extract_text_passes_through() {
        let region = canvas(10, 10, 200);
        let mut ocr = FixedOcr(Ok("JANE DOE".into()));
        assert_eq!(extract_text(&region, &mut ocr), "JANE DOE");
    }

    #[test]
    fn test_extract_face_takes_first_detection() {
        let region = canvas(40, 40, 200);
        let boxes = vec![
            FaceBox { x: 0.0, y: 0.0, width: 10.0, height: 12.0, confidence: 0.9, landmarks: None },
            FaceBox { x: 20.0, y: 20.0, width: 5.0, height: 5.0, confidence: 0.95, landmarks: None },
        ];
        let mut faces = FixedFaces(Ok(boxes));
        let crop = extract_face(&region, &mut faces);
        assert_eq!(crop.found().unwrap().dimensions(), (10, 12));
    }

    #[test]
    fn test_extract_face_not_found() {
        let region = canvas(40, 40, 200);
        let mut faces = FixedFaces(Ok(vec![]));
        assert!(!extract_face(&region, &mut faces).is_found());
    }

    #[test]
    fn test_extract_face_detector_error_is_degraded() {
        let region = canvas(40, 40, 200);
        let mut faces = FixedFaces(Err(DetectError("model missing".into())));
        let outcome = extract_face(&region, &mut faces);
        assert!(matches!(outcome, StageOutcome::Errored(_)));
    }
}
