//! Video analysis: representative frame extraction and the blink-counting
//! liveness pass, fused into one sweep over the frame stream.
//!
//! The first readable frame is kept verbatim (uncropped) as the "video
//! face" proxy for matching. Every frame is then run through the face
//! detector and, per detected face, the open-eye detector; a face region
//! with zero open eyes counts as one blink event. The pass visits every
//! frame in sequence order to end of stream, unless a scan limit trips.

use crate::contracts::{FaceLocator, FrameSource, OpenEyeDetector};
use crate::types::LivenessReport;
use image::GrayImage;
use std::time::{Duration, Instant};

/// Bounds on the frame scan. Video length is caller-controlled, so the
/// scan is the only potentially unbounded stage; either limit ends it
/// early with a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanLimits {
    pub max_frames: Option<usize>,
    pub time_budget: Option<Duration>,
}

/// Output of the fused video pass.
#[derive(Debug, Clone)]
pub struct VideoAnalysis {
    /// First readable frame, whole and uncropped.
    pub first_frame: Option<GrayImage>,
    pub liveness: LivenessReport,
    pub frames_scanned: usize,
}

/// Scan the full frame stream once.
///
/// Stream read errors degrade: the scan stops where it is and whatever
/// was observed so far stands. Detector errors on individual frames are
/// logged and skipped; only an explicit "no open eyes" observation
/// increments the blink count.
pub fn analyze(
    source: &mut dyn FrameSource,
    faces: &mut dyn FaceLocator,
    eyes: &mut dyn OpenEyeDetector,
    limits: &ScanLimits,
) -> VideoAnalysis {
    let started = Instant::now();
    let mut first_frame: Option<GrayImage> = None;
    let mut face_detected = false;
    let mut blink_count = 0u32;
    let mut frames_scanned = 0usize;

    loop {
        if let Some(max) = limits.max_frames {
            if frames_scanned >= max {
                tracing::warn!(max, "frame cap reached; ending liveness scan early");
                break;
            }
        }
        if let Some(budget) = limits.time_budget {
            if started.elapsed() >= budget {
                tracing::warn!(?budget, frames_scanned, "time budget exhausted; ending liveness scan early");
                break;
            }
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, frames_scanned, "video stream unreadable; ending scan");
                break;
            }
        };
        frames_scanned += 1;

        if first_frame.is_none() {
            first_frame = Some(frame.clone());
        }

        let detections = match faces.locate(&frame) {
            Ok(d) => d,
            Err(err) => {
                tracing::warn!(error = %err, "face detection failed on frame; skipping");
                continue;
            }
        };

        if !detections.is_empty() {
            face_detected = true;
        }
        for face in &detections {
            match eyes.count_open_eyes(&frame, face) {
                Ok(0) => blink_count += 1,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "eye detection failed on face region; skipping");
                }
            }
        }
    }

    let liveness = LivenessReport::new(face_detected, blink_count);
    tracing::info!(
        frames_scanned,
        face_detected = liveness.face_detected,
        blink_count = liveness.blink_count,
        confirmed = liveness.confirmed,
        "liveness scan finished"
    );

    VideoAnalysis {
        first_frame,
        liveness,
        frames_scanned,
    }
}
