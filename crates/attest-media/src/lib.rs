//! attest-media — Asset decoding for the verification pipeline.
//!
//! Still images decode through the `image` crate; video frames stream
//! from an `ffmpeg` child process as raw grayscale.

pub mod video;

pub use video::VideoFrames;

use image::GrayImage;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("image decode: {0}")]
    Image(#[from] image::ImageError),
    #[error("ffprobe: {0}")]
    Probe(String),
    #[error("ffmpeg: {0}")]
    Decode(String),
}

/// Load a still image from disk as grayscale.
pub fn load_image(path: &Path) -> Result<GrayImage, MediaError> {
    Ok(image::open(path)?.to_luma8())
}

/// Decode an in-memory still image as grayscale.
pub fn decode_image(bytes: &[u8]) -> Result<GrayImage, MediaError> {
    Ok(image::load_from_memory(bytes)?.to_luma8())
}
