use attest_core::{PipelineConfig, ScanLimits};
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration, loaded from environment variables.
pub struct Config {
    /// Listen address (default: 127.0.0.1:5000).
    pub bind_addr: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Tesseract binary to invoke for OCR.
    pub tesseract_bin: String,
    /// OCR language code.
    pub ocr_language: String,
    /// Minimum similarity for acceptance (combined with a name match).
    pub accept_similarity: f32,
    /// Document binarization threshold.
    pub binarize_threshold: u8,
    /// Hard cap on frames visited by the liveness scan.
    pub scan_max_frames: usize,
    /// Wall-clock budget for the liveness scan, in seconds.
    pub scan_budget_secs: u64,
    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from `ATTEST_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("ATTEST_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| attest_models::default_model_dir());

        Self {
            bind_addr: std::env::var("ATTEST_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:5000".to_string()),
            model_dir,
            tesseract_bin: std::env::var("ATTEST_TESSERACT_BIN")
                .unwrap_or_else(|_| "tesseract".to_string()),
            ocr_language: std::env::var("ATTEST_OCR_LANG").unwrap_or_else(|_| "eng".to_string()),
            accept_similarity: env_f32("ATTEST_ACCEPT_SIMILARITY", 10.0),
            binarize_threshold: env_u8("ATTEST_BINARIZE_THRESHOLD", 150),
            scan_max_frames: env_usize("ATTEST_SCAN_MAX_FRAMES", 1800),
            scan_budget_secs: env_u64("ATTEST_SCAN_BUDGET_SECS", 60),
            max_upload_bytes: env_usize("ATTEST_MAX_UPLOAD_BYTES", 64 * 1024 * 1024),
        }
    }

    /// Path to the SCRFD face detection model.
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join("det_10g.onnx")
    }

    /// Path to the eye-state classification model.
    pub fn eye_model_path(&self) -> PathBuf {
        self.model_dir.join("eye_state.onnx")
    }

    /// Path to the ArcFace embedding model.
    pub fn embedder_model_path(&self) -> PathBuf {
        self.model_dir.join("w600k_r50.onnx")
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            binarize_threshold: self.binarize_threshold,
            accept_similarity: self.accept_similarity,
            scan_limits: ScanLimits {
                max_frames: Some(self.scan_max_frames),
                time_budget: Some(Duration::from_secs(self.scan_budget_secs)),
            },
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u8(key: &str, default: u8) -> u8 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Fresh process env: none of these are normally set under test.
        let config = Config::from_env();
        assert_eq!(config.accept_similarity, 10.0);
        assert_eq!(config.binarize_threshold, 150);
        assert!(config.scan_max_frames > 0);
    }

    #[test]
    fn test_pipeline_config_carries_limits() {
        let config = Config::from_env();
        let pc = config.pipeline_config();
        assert_eq!(pc.scan_limits.max_frames, Some(config.scan_max_frames));
        assert!(pc.scan_limits.time_budget.is_some());
    }

    #[test]
    fn test_model_paths() {
        let mut config = Config::from_env();
        config.model_dir = PathBuf::from("/models");
        assert_eq!(config.detector_model_path(), PathBuf::from("/models/det_10g.onnx"));
        assert_eq!(config.eye_model_path(), PathBuf::from("/models/eye_state.onnx"));
        assert_eq!(config.embedder_model_path(), PathBuf::from("/models/w600k_r50.onnx"));
    }
}
