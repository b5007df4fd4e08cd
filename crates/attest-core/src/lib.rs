//! attest-core — Identity verification pipeline.
//!
//! Correlates a photo-identity document with a short video of a person:
//! document framing and OCR, document-face extraction, blink-counting
//! liveness, name matching, and face-similarity fusion, sequenced by a
//! single orchestrator that reports progress through an event sink.
//!
//! The CV/OCR/embedding engines are external collaborators behind the
//! traits in [`contracts`]; this crate only defines what it requires from
//! them and how their partial, possibly-missing outputs combine into a
//! final verdict.

pub mod contracts;
pub mod document;
pub mod matcher;
pub mod name;
pub mod pipeline;
pub mod types;
pub mod video;

pub use contracts::{
    CompareError, DetectError, FaceBox, FaceComparator, FaceLocator, FrameSource,
    FrameStreamError, OcrError, OpenEyeDetector, TextRecognizer,
};
pub use pipeline::{
    verify, Collaborators, NullSink, PipelineConfig, PipelineError, ProgressSink, Stage,
};
pub use types::{LivenessReport, StageOutcome, VerificationOutcome};
pub use video::ScanLimits;
