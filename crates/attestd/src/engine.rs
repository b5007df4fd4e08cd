//! Verification engine thread.
//!
//! Model sessions are `&mut self`, so they live on one dedicated OS
//! thread; HTTP handlers submit jobs over an mpsc channel and await the
//! oneshot reply. Model loading is synchronous and fail-fast at startup.

use crate::config::Config;
use attest_core::{
    Collaborators, FrameSource, FrameStreamError, NullSink, PipelineConfig, PipelineError,
    VerificationOutcome,
};
use attest_media::{MediaError, VideoFrames};
use attest_models::{
    EyeStateClassifier, FaceComparisonEngine, FaceDetector, FaceEmbedder, ModelError, TesseractOcr,
};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model: {0}")]
    Model(#[from] ModelError),
    #[error("media: {0}")]
    Media(#[from] MediaError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("engine thread exited")]
    ChannelClosed,
}

struct VerifyJob {
    document: Vec<u8>,
    video_path: PathBuf,
    full_name: String,
    reply: oneshot::Sender<Result<VerificationOutcome, EngineError>>,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<VerifyJob>,
}

impl EngineHandle {
    /// Run one verification on the engine thread.
    pub async fn verify(
        &self,
        document: Vec<u8>,
        video_path: PathBuf,
        full_name: String,
    ) -> Result<VerificationOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(VerifyJob {
                document,
                video_path,
                full_name,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

struct Engine {
    ocr: TesseractOcr,
    detector: FaceDetector,
    eyes: EyeStateClassifier,
    comparator: FaceComparisonEngine,
    pipeline_config: PipelineConfig,
}

/// Frame source for a video that could not be opened: the scan sees an
/// immediate end of stream and liveness stays unconfirmed.
struct NoFrames;

impl FrameSource for NoFrames {
    fn next_frame(&mut self) -> Result<Option<image::GrayImage>, FrameStreamError> {
        Ok(None)
    }
}

impl Engine {
    fn run(&mut self, job: &VerifyJob) -> Result<VerificationOutcome, EngineError> {
        let document = attest_media::decode_image(&job.document)?;

        // An unreadable video degrades rather than failing the run.
        let mut opened;
        let mut empty;
        let frames: &mut dyn FrameSource = match VideoFrames::open(&job.video_path) {
            Ok(stream) => {
                opened = stream;
                &mut opened
            }
            Err(err) => {
                tracing::warn!(error = %err, "video unreadable; continuing without frames");
                empty = NoFrames;
                &mut empty
            }
        };

        let mut collab = Collaborators {
            ocr: &mut self.ocr,
            faces: &mut self.detector,
            eyes: &mut self.eyes,
            comparator: &mut self.comparator,
        };

        Ok(attest_core::verify(
            &document,
            frames,
            &job.full_name,
            &mut collab,
            &self.pipeline_config,
            &mut NullSink,
        )?)
    }
}

/// Load all models and spawn the engine on a dedicated OS thread.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let detector = FaceDetector::load(&config.detector_model_path())?;
    let eyes = EyeStateClassifier::load(&config.eye_model_path())?;
    // The comparison engine runs its own detection pass, so it gets a
    // separate detector session.
    let comparator = FaceComparisonEngine::new(
        FaceDetector::load(&config.detector_model_path())?,
        FaceEmbedder::load(&config.embedder_model_path())?,
    );
    let ocr = TesseractOcr::new(&config.tesseract_bin, &config.ocr_language);

    let mut engine = Engine {
        ocr,
        detector,
        eyes,
        comparator,
        pipeline_config: config.pipeline_config(),
    };

    let (tx, mut rx) = mpsc::channel::<VerifyJob>(4);

    std::thread::Builder::new()
        .name("attest-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(job) = rx.blocking_recv() {
                tracing::info!(full_name = %job.full_name, "verification started");
                let result = engine.run(&job);
                if let Err(err) = &result {
                    tracing::warn!(error = %err, "verification failed");
                }
                let _ = job.reply.send(result);
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}
