//! Command-style verification front end.
//!
//! Emits a machine-readable `PROGRESS:<percent>` line after each of the
//! seven pipeline stages; every other line is a human-readable
//! diagnostic. Assets may be local paths or http(s) URLs.

use anyhow::{Context, Result};
use attest_core::{
    Collaborators, FrameSource, FrameStreamError, PipelineConfig, ProgressSink, Stage,
};
use attest_media::VideoFrames;
use attest_models::{
    EyeStateClassifier, FaceComparisonEngine, FaceDetector, FaceEmbedder, TesseractOcr,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "attest", about = "Verify a photo-ID document against a short video")]
struct Cli {
    /// Document image: local path or http(s) URL
    document: String,
    /// Video: local path or http(s) URL
    video: String,
    /// Claimed full name to match against the document text
    full_name: String,
}

/// Frame source for a video that could not be opened.
struct NoFrames;

impl FrameSource for NoFrames {
    fn next_frame(&mut self) -> Result<Option<image::GrayImage>, FrameStreamError> {
        Ok(None)
    }
}

/// Renders stage completions as `PROGRESS:<percent>` lines on stdout.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn stage_completed(&mut self, stage: Stage) {
        println!("PROGRESS:{}", stage.percent());
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Downloaded assets live here; removed when the run ends, either way.
    let staging = tempfile::tempdir().context("create staging directory")?;
    let document_path = materialize(&cli.document, staging.path(), "document")?;
    let video_path = materialize(&cli.video, staging.path(), "video")?;

    let model_dir = std::env::var("ATTEST_MODEL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| attest_models::default_model_dir());
    let tesseract_bin =
        std::env::var("ATTEST_TESSERACT_BIN").unwrap_or_else(|_| "tesseract".to_string());
    let ocr_language = std::env::var("ATTEST_OCR_LANG").unwrap_or_else(|_| "eng".to_string());

    let mut detector =
        FaceDetector::load(&model_dir.join("det_10g.onnx")).context("load face detector")?;
    let mut eyes =
        EyeStateClassifier::load(&model_dir.join("eye_state.onnx")).context("load eye model")?;
    let mut comparator = FaceComparisonEngine::new(
        FaceDetector::load(&model_dir.join("det_10g.onnx")).context("load face detector")?,
        FaceEmbedder::load(&model_dir.join("w600k_r50.onnx")).context("load embedder")?,
    );
    let mut ocr = TesseractOcr::new(tesseract_bin, ocr_language);

    let document = attest_media::load_image(&document_path).context("read document image")?;

    // An unreadable video degrades: the scan just sees no frames.
    let mut opened;
    let mut empty;
    let frames: &mut dyn FrameSource = match VideoFrames::open(&video_path) {
        Ok(stream) => {
            opened = stream;
            &mut opened
        }
        Err(err) => {
            eprintln!("Could not read video: {err}");
            empty = NoFrames;
            &mut empty
        }
    };

    let mut collab = Collaborators {
        ocr: &mut ocr,
        faces: &mut detector,
        eyes: &mut eyes,
        comparator: &mut comparator,
    };

    let outcome = attest_core::verify(
        &document,
        frames,
        &cli.full_name,
        &mut collab,
        &PipelineConfig::default(),
        &mut ConsoleProgress,
    )?;

    println!(
        "{}",
        if outcome.document_found {
            "Document detected in image."
        } else {
            "No document detected in image."
        }
    );
    println!("Extracted Text:\n{}", outcome.extracted_text);
    println!(
        "{}",
        if outcome.liveness.face_detected {
            "Face detected in video."
        } else {
            "No face detected in video."
        }
    );
    println!("Blinks detected: {}", outcome.liveness.blink_count);
    println!(
        "{}",
        if outcome.liveness.confirmed {
            "Liveness confirmed (human detected)."
        } else {
            "Liveness not confirmed."
        }
    );
    if outcome.name_match {
        println!("Full name match found: {}", cli.full_name);
    } else {
        println!("Full name does not match. Provided: {}", cli.full_name);
    }
    match outcome.distance {
        Some(distance) => println!(
            "Face {}: similarity {:.1}% (distance={:.2})",
            if outcome.face_match { "accepted" } else { "NOT accepted" },
            outcome.similarity,
            distance
        ),
        None => println!("Face NOT accepted: no face comparison was possible."),
    }

    Ok(())
}

/// Resolve an asset argument to a local path, downloading URLs into the
/// staging directory.
fn materialize(asset: &str, staging: &Path, label: &str) -> Result<PathBuf> {
    if asset.starts_with("http://") || asset.starts_with("https://") {
        let response = reqwest::blocking::get(asset)
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("download {label} from {asset}"))?;
        let bytes = response.bytes().with_context(|| format!("read {label} body"))?;
        let path = staging.join(label);
        std::fs::write(&path, &bytes).with_context(|| format!("stage {label}"))?;
        Ok(path)
    } else {
        Ok(PathBuf::from(asset))
    }
}
