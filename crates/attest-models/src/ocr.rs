//! OCR via a Tesseract subprocess.
//!
//! The document region is written to a temporary PNG and handed to the
//! `tesseract` binary; stdout is the recognized text. The temp file is
//! removed when the handle drops, on every path.

use attest_core::{OcrError, TextRecognizer};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;

pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl TextRecognizer for TesseractOcr {
    fn recognize(&mut self, region: &GrayImage) -> Result<String, OcrError> {
        let file = tempfile::Builder::new()
            .prefix("attest-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError(format!("temp file: {e}")))?;
        region
            .save(file.path())
            .map_err(|e| OcrError(format!("write region: {e}")))?;

        let output = Command::new(&self.binary)
            .arg(file.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .map_err(|e| OcrError(format!("spawn {}: {e}", self.binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
