//! Face-similarity scoring and the acceptance decision.

use crate::contracts::{CompareError, FaceComparator};
use image::GrayImage;

/// Minimum similarity for acceptance, combined with a name match.
pub const DEFAULT_ACCEPT_SIMILARITY: f32 = 10.0;

/// `similarity = 100 × (1 − distance)`.
///
/// Unclamped: a distance above 1 yields a negative similarity, which the
/// threshold then rejects. 0 distance maps to 100.
pub fn similarity_from_distance(distance: f32) -> f32 {
    100.0 * (1.0 - distance)
}

/// Outcome of the face-matching stage.
#[derive(Debug, Clone)]
pub struct FaceMatchReport {
    /// Raw embedding distance; `None` when no comparison was attempted.
    pub distance: Option<f32>,
    pub similarity: f32,
    /// `similarity ≥ threshold AND name_match` — the two signals are
    /// deliberately folded into one flag; callers wanting their own
    /// policy recombine from the outcome fields.
    pub accepted: bool,
}

impl FaceMatchReport {
    /// "No match attempted": similarity 0, not accepted.
    pub fn skipped() -> Self {
        Self {
            distance: None,
            similarity: 0.0,
            accepted: false,
        }
    }
}

/// Compare the document face with the video face.
///
/// Requires both inputs; if either is absent the comparator is never
/// invoked and a skipped report is returned. A comparator failure is an
/// operational problem, propagated as a typed error rather than folded
/// into the verdict.
pub fn match_faces(
    comparator: &mut dyn FaceComparator,
    document_face: Option<&GrayImage>,
    video_face: Option<&GrayImage>,
    name_match: bool,
    accept_similarity: f32,
) -> Result<FaceMatchReport, CompareError> {
    let (reference, probe) = match (document_face, video_face) {
        (Some(r), Some(p)) => (r, p),
        _ => {
            tracing::info!(
                have_document_face = document_face.is_some(),
                have_video_face = video_face.is_some(),
                "face matching skipped; both faces required"
            );
            return Ok(FaceMatchReport::skipped());
        }
    };

    let distance = comparator.distance(reference, probe)?;
    let similarity = similarity_from_distance(distance);
    let accepted = similarity >= accept_similarity && name_match;
    tracing::info!(distance, similarity, accepted, "face comparison done");

    Ok(FaceMatchReport {
        distance: Some(distance),
        similarity,
        accepted,
    })
}
