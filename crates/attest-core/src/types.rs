//! Result types produced by the pipeline stages.

use serde::Serialize;

/// Tagged per-stage result: the stage found something, found nothing, or
/// the backing engine failed. "Found nothing" is a recognized outcome,
/// not an error; `Errored` records a degraded stage whose failure was
/// folded into the run rather than aborting it.
#[derive(Debug, Clone)]
pub enum StageOutcome<T> {
    Found(T),
    NotFound,
    Errored(String),
}

impl<T> StageOutcome<T> {
    pub fn found(&self) -> Option<&T> {
        match self {
            StageOutcome::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, StageOutcome::Found(_))
    }

    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => StageOutcome::Found(v),
            None => StageOutcome::NotFound,
        }
    }
}

/// Blink-based liveness signal aggregated over the full frame sequence.
///
/// Best-effort heuristic only: blink events are frames where a detected
/// face region contained zero open eyes, which overcounts whenever eye
/// detection simply fails. Not a security control.
#[derive(Debug, Clone, Serialize)]
pub struct LivenessReport {
    /// At least one frame contained a detected face.
    pub face_detected: bool,
    /// Number of (frame, face) observations with zero open eyes.
    pub blink_count: u32,
    /// `face_detected && blink_count > 0`.
    pub confirmed: bool,
}

impl LivenessReport {
    pub fn new(face_detected: bool, blink_count: u32) -> Self {
        Self {
            face_detected,
            blink_count,
            confirmed: face_detected && blink_count > 0,
        }
    }
}

/// Aggregate verdict for one verification run — the only entity exposed
/// across the system boundary.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    /// A document region was located in the still image.
    pub document_found: bool,
    /// OCR text from the document region (empty when nothing was read).
    pub extracted_text: String,
    /// Normalized claimed name was a substring of the normalized text.
    pub name_match: bool,
    pub liveness: LivenessReport,
    /// Raw embedding distance, absent when face matching was skipped.
    pub distance: Option<f32>,
    /// `100 × (1 − distance)`; 0 when face matching was skipped.
    /// Deliberately unclamped: distances above 1 go negative.
    pub similarity: f32,
    /// Final verdict: similarity over threshold AND the name matched.
    pub face_match: bool,
}

impl VerificationOutcome {
    pub fn accepted(&self) -> bool {
        self.face_match
    }
}
