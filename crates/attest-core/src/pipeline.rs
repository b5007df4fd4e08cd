//! Verification orchestrator: one linear 7-stage run shared by every
//! front end, parameterized by a progress sink.
//!
//! No stage is skipped even when an earlier stage produced nothing, so a
//! completed run always walks all 7 stages and progress reaches 100%.
//! Stage events report pipeline advancement, not success.

use crate::contracts::{
    CompareError, FaceComparator, FaceLocator, FrameSource, OpenEyeDetector, TextRecognizer,
};
use crate::types::{StageOutcome, VerificationOutcome};
use crate::video::ScanLimits;
use crate::{document, matcher, name, video};
use image::GrayImage;
use thiserror::Error;

/// The seven pipeline stages, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DocumentDetect,
    TextExtract,
    DocFaceExtract,
    VideoFrameExtract,
    VideoFaceDetect,
    NameMatch,
    FaceMatch,
}

impl Stage {
    pub const TOTAL: u32 = 7;

    /// 1-based position in the run.
    pub fn step(self) -> u32 {
        match self {
            Stage::DocumentDetect => 1,
            Stage::TextExtract => 2,
            Stage::DocFaceExtract => 3,
            Stage::VideoFrameExtract => 4,
            Stage::VideoFaceDetect => 5,
            Stage::NameMatch => 6,
            Stage::FaceMatch => 7,
        }
    }

    /// Progress after this stage completes: `round(100 × step / 7)`.
    pub fn percent(self) -> u32 {
        ((self.step() as f64 / Self::TOTAL as f64) * 100.0).round() as u32
    }
}

/// Receives a stage-completion event as soon as each stage finishes,
/// regardless of what the stage found.
pub trait ProgressSink {
    fn stage_completed(&mut self, stage: Stage);
}

/// Sink for callers that do not expose incremental progress.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn stage_completed(&mut self, _stage: Stage) {}
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub binarize_threshold: u8,
    pub accept_similarity: f32,
    pub scan_limits: ScanLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            binarize_threshold: document::DEFAULT_BINARIZE_THRESHOLD,
            accept_similarity: matcher::DEFAULT_ACCEPT_SIMILARITY,
            scan_limits: ScanLimits::default(),
        }
    }
}

/// The external engines one run borrows. Sessions are `&mut` because
/// inference backends mutate internal state.
pub struct Collaborators<'a> {
    pub ocr: &'a mut dyn TextRecognizer,
    pub faces: &'a mut dyn FaceLocator,
    pub eyes: &'a mut dyn OpenEyeDetector,
    pub comparator: &'a mut dyn FaceComparator,
}

/// The only pipeline-level failure. Everything else degrades into the
/// outcome; a comparator failure is an operational problem the caller
/// must see as such.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("face matching error: {0}")]
    FaceMatch(#[from] CompareError),
}

/// Run one verification: document still + video stream + claimed name in,
/// aggregated outcome out.
pub fn verify(
    document_image: &GrayImage,
    video_stream: &mut dyn FrameSource,
    claimed_name: &str,
    collab: &mut Collaborators<'_>,
    config: &PipelineConfig,
    sink: &mut dyn ProgressSink,
) -> Result<VerificationOutcome, PipelineError> {
    // 1. Document detection
    let region = document::locate_document(document_image, config.binarize_threshold);
    match &region {
        Some(r) => tracing::info!(width = r.width(), height = r.height(), "document detected in image"),
        None => tracing::info!("no document detected in image"),
    }
    sink.stage_completed(Stage::DocumentDetect);

    // 2. Text extraction
    let extracted_text = match &region {
        Some(r) => document::extract_text(r, collab.ocr),
        None => String::new(),
    };
    tracing::info!(chars = extracted_text.len(), "text extraction done");
    sink.stage_completed(Stage::TextExtract);

    // 3. Document face extraction
    let document_face = match &region {
        Some(r) => document::extract_face(r, collab.faces),
        None => StageOutcome::NotFound,
    };
    tracing::info!(found = document_face.is_found(), "document face extraction done");
    sink.stage_completed(Stage::DocFaceExtract);

    // 4 + 5. Fused video pass: representative frame, then liveness. The
    // stream is consumed once, so both stages complete together; events
    // still fire in order.
    let video_analysis = video::analyze(video_stream, collab.faces, collab.eyes, &config.scan_limits);
    sink.stage_completed(Stage::VideoFrameExtract);
    sink.stage_completed(Stage::VideoFaceDetect);

    // 6. Name match
    let name_match = name::matches(&extracted_text, claimed_name);
    tracing::info!(name_match, "name matching done");
    sink.stage_completed(Stage::NameMatch);

    // 7. Face match. The stage event fires even when the comparator
    // fails: progress tracks advancement, and the error surfaces on its
    // own channel.
    let report = match matcher::match_faces(
        collab.comparator,
        document_face.found(),
        video_analysis.first_frame.as_ref(),
        name_match,
        config.accept_similarity,
    ) {
        Ok(report) => report,
        Err(err) => {
            sink.stage_completed(Stage::FaceMatch);
            return Err(err.into());
        }
    };
    sink.stage_completed(Stage::FaceMatch);

    Ok(VerificationOutcome {
        document_found: region.is_some(),
        extracted_text,
        name_match,
        liveness: video_analysis.liveness,
        distance: report.distance,
        similarity: report.similarity,
        face_match: report.accepted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{DetectError, FaceBox, FrameStreamError, OcrError};
    use image::GrayImage;

    const BRIGHT: u8 = 220;

    fn document_with_region() -> GrayImage {
        let mut img = GrayImage::new(64, 64);
        for y in 8..56 {
            for x in 8..56 {
                img.put_pixel(x, y, image::Luma([BRIGHT]));
            }
        }
        img
    }

    fn blank_document() -> GrayImage {
        GrayImage::new(64, 64)
    }

    struct Stream(Vec<GrayImage>);
    impl FrameSource for Stream {
        fn next_frame(&mut self) -> Result<Option<GrayImage>, FrameStreamError> {
            if self.0.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.0.remove(0)))
            }
        }
    }

    /// Scripted collaborator set, one mock per seam.
    struct Mock {
        ocr: MockOcr,
        faces: MockFaces,
        eyes: MockEyes,
        comparator: MockComparator,
    }

    impl Mock {
        fn new() -> Self {
            Self {
                ocr: MockOcr(Ok("REPUBLIC ID  ALICE SMITH  1990".into())),
                faces: MockFaces(true),
                eyes: MockEyes(0),
                comparator: MockComparator { distance: Ok(0.2), calls: 0 },
            }
        }
    }

    struct MockOcr(Result<String, ()>);
    impl TextRecognizer for MockOcr {
        fn recognize(&mut self, _: &GrayImage) -> Result<String, OcrError> {
            self.0.clone().map_err(|_| OcrError("ocr down".into()))
        }
    }

    struct MockFaces(bool);
    impl FaceLocator for MockFaces {
        fn locate(&mut self, _: &GrayImage) -> Result<Vec<FaceBox>, DetectError> {
            if self.0 {
                Ok(vec![FaceBox {
                    x: 1.0,
                    y: 1.0,
                    width: 10.0,
                    height: 10.0,
                    confidence: 0.9,
                    landmarks: None,
                }])
            } else {
                Ok(vec![])
            }
        }
    }

    struct MockEyes(u32);
    impl OpenEyeDetector for MockEyes {
        fn count_open_eyes(&mut self, _: &GrayImage, _: &FaceBox) -> Result<u32, DetectError> {
            Ok(self.0)
        }
    }

    struct MockComparator {
        distance: Result<f32, ()>,
        calls: u32,
    }
    impl FaceComparator for MockComparator {
        fn distance(&mut self, _: &GrayImage, _: &GrayImage) -> Result<f32, CompareError> {
            self.calls += 1;
            self.distance.map_err(|_| CompareError("model blew up".into()))
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<Stage>);
    impl ProgressSink for Recorder {
        fn stage_completed(&mut self, stage: Stage) {
            self.0.push(stage);
        }
    }

    fn run(
        doc: GrayImage,
        frames: Vec<GrayImage>,
        claimed: &str,
        mock: &mut Mock,
        sink: &mut Recorder,
    ) -> Result<VerificationOutcome, PipelineError> {
        let mut stream = Stream(frames);
        let mut collab = Collaborators {
            ocr: &mut mock.ocr,
            faces: &mut mock.faces,
            eyes: &mut mock.eyes,
            comparator: &mut mock.comparator,
        };
        verify(&doc, &mut stream, claimed, &mut collab, &PipelineConfig::default(), sink)
    }

    fn frames(n: usize) -> Vec<GrayImage> {
        vec![GrayImage::new(8, 8); n]
    }

    #[test]
    fn test_percent_table() {
        let expected = [14, 29, 43, 57, 71, 86, 100];
        let stages = [
            Stage::DocumentDetect,
            Stage::TextExtract,
            Stage::DocFaceExtract,
            Stage::VideoFrameExtract,
            Stage::VideoFaceDetect,
            Stage::NameMatch,
            Stage::FaceMatch,
        ];
        for (stage, pct) in stages.iter().zip(expected) {
            assert_eq!(stage.percent(), pct);
        }
    }

    #[test]
    fn test_accepted_run_emits_all_stages_in_order() {
        let mut mock = Mock::new();
        let mut sink = Recorder::default();
        let outcome = run(document_with_region(), frames(3), "Alice Smith", &mut mock, &mut sink).unwrap();

        assert!(outcome.accepted());
        assert!(outcome.name_match);
        assert!(outcome.liveness.confirmed);
        assert!((outcome.similarity - 80.0).abs() < 1e-3);

        let steps: Vec<u32> = sink.0.iter().map(|s| s.step()).collect();
        assert_eq!(steps, vec![1, 2, 3, 4, 5, 6, 7]);
        // Percent sequence is monotonically non-decreasing and ends at 100.
        let pcts: Vec<u32> = sink.0.iter().map(|s| s.percent()).collect();
        assert!(pcts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*pcts.last().unwrap(), 100);
    }

    #[test]
    fn test_empty_everything_still_reaches_all_stages() {
        let mut mock = Mock::new();
        mock.faces.0 = false;
        mock.ocr.0 = Err(());
        let mut sink = Recorder::default();
        let outcome = run(blank_document(), frames(0), "Alice Smith", &mut mock, &mut sink).unwrap();

        assert!(!outcome.document_found);
        assert_eq!(outcome.extracted_text, "");
        assert!(!outcome.face_match);
        assert_eq!(outcome.similarity, 0.0);
        assert_eq!(sink.0.len(), 7);
        assert_eq!(sink.0.last().unwrap().percent(), 100);
    }

    #[test]
    fn test_no_document_face_skips_comparator() {
        let mut mock = Mock::new();
        mock.faces.0 = false;
        let mut sink = Recorder::default();
        let outcome = run(document_with_region(), frames(2), "Alice Smith", &mut mock, &mut sink).unwrap();

        assert_eq!(mock.comparator.calls, 0);
        assert!(!outcome.face_match);
        assert_eq!(outcome.similarity, 0.0);
        assert_eq!(outcome.distance, None);
    }

    #[test]
    fn test_no_video_frame_skips_comparator() {
        let mut mock = Mock::new();
        let mut sink = Recorder::default();
        let outcome = run(document_with_region(), frames(0), "Alice Smith", &mut mock, &mut sink).unwrap();

        assert_eq!(mock.comparator.calls, 0);
        assert!(!outcome.face_match);
        // Liveness never saw a face either.
        assert!(!outcome.liveness.confirmed);
    }

    #[test]
    fn test_name_mismatch_blocks_acceptance() {
        let mut mock = Mock::new();
        let mut sink = Recorder::default();
        let outcome = run(document_with_region(), frames(2), "Bob Jones", &mut mock, &mut sink).unwrap();

        assert!(!outcome.name_match);
        assert!(!outcome.face_match);
        // Raw similarity is still reported.
        assert!((outcome.similarity - 80.0).abs() < 1e-3);
    }

    #[test]
    fn test_comparator_failure_is_typed_and_still_emits_stage() {
        let mut mock = Mock::new();
        mock.comparator.distance = Err(());
        let mut sink = Recorder::default();
        let result = run(document_with_region(), frames(2), "Alice Smith", &mut mock, &mut sink);

        assert!(matches!(result, Err(PipelineError::FaceMatch(_))));
        assert_eq!(sink.0.len(), 7);
        assert_eq!(sink.0.last().unwrap().percent(), 100);
    }

    #[test]
    fn test_liveness_runs_even_without_document() {
        let mut mock = Mock::new();
        let mut sink = Recorder::default();
        let outcome = run(blank_document(), frames(2), "Alice Smith", &mut mock, &mut sink).unwrap();

        // No document, but the video still went through liveness.
        assert!(outcome.liveness.face_detected);
        assert!(outcome.liveness.confirmed);
        assert!(!outcome.face_match);
    }
}
