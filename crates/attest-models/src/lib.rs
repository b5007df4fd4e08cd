//! attest-models — Concrete engines behind the `attest-core` contracts.
//!
//! Face detection (SCRFD), eye-state classification, and face embeddings
//! (ArcFace) run via ONNX Runtime on CPU; OCR is delegated to a
//! Tesseract subprocess.

pub mod detector;
pub mod embedder;
pub mod eyes;
pub mod ocr;

pub use detector::FaceDetector;
pub use embedder::{FaceComparisonEngine, FaceEmbedder};
pub use eyes::EyeStateClassifier;
pub use ocr::TesseractOcr;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model file not found: {0}")]
    NotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Default directory holding the ONNX model files.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/attest/models")
}
