//! Video frame streaming via ffmpeg.
//!
//! `ffprobe` reports the stream dimensions, then `ffmpeg` decodes the
//! file to raw 8-bit grayscale on stdout; each frame is exactly
//! `width × height` bytes, read in sequence order, non-restartable.

use crate::MediaError;
use attest_core::{FrameSource, FrameStreamError};
use image::GrayImage;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

/// Sequential grayscale frame stream over one video file.
pub struct VideoFrames {
    child: Child,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    finished: bool,
}

impl VideoFrames {
    /// Probe the video and spawn the decoder.
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        let (width, height) = probe_dimensions(path)?;
        tracing::debug!(path = %path.display(), width, height, "video stream opened");

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "gray", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::Decode(format!("spawn ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::Decode("ffmpeg stdout unavailable".into()))?;

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            width,
            height,
            finished: false,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl FrameSource for VideoFrames {
    fn next_frame(&mut self) -> Result<Option<GrayImage>, FrameStreamError> {
        if self.finished {
            return Ok(None);
        }

        let frame_len = (self.width * self.height) as usize;
        match read_frame(&mut self.stdout, frame_len) {
            Ok(Some(data)) => GrayImage::from_raw(self.width, self.height, data)
                .map(Some)
                .ok_or_else(|| FrameStreamError("frame buffer size mismatch".into())),
            Ok(None) => {
                self.finished = true;
                let _ = self.child.wait();
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(FrameStreamError(e.to_string()))
            }
        }
    }
}

impl Drop for VideoFrames {
    fn drop(&mut self) {
        // Kill is a no-op once the decoder has exited; without it a wait
        // could block on a decoder still filling the pipe.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Read exactly one frame; `None` on a clean end of stream, an error on
/// a mid-frame truncation.
fn read_frame(reader: &mut impl Read, frame_len: usize) -> std::io::Result<Option<Vec<u8>>> {
    let mut data = vec![0u8; frame_len];
    let mut filled = 0usize;
    while filled < frame_len {
        let n = reader.read(&mut data[filled..])?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("truncated frame: {filled} of {frame_len} bytes"),
                ))
            };
        }
        filled += n;
    }
    Ok(Some(data))
}

fn probe_dimensions(path: &Path) -> Result<(u32, u32), MediaError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .map_err(|e| MediaError::Probe(format!("spawn ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::Probe(format!(
            "ffprobe exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    parse_dimensions(&String::from_utf8_lossy(&output.stdout))
}

fn parse_dimensions(csv: &str) -> Result<(u32, u32), MediaError> {
    let line = csv
        .lines()
        .next()
        .ok_or_else(|| MediaError::Probe("no video stream".into()))?;
    let mut parts = line.trim().trim_end_matches(',').split(',');
    let width = parts
        .next()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|&v| v > 0);
    let height = parts
        .next()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|&v| v > 0);
    match (width, height) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(MediaError::Probe(format!("unparseable dimensions: {line:?}"))),
    }
}
