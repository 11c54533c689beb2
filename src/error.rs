//! Error types for the `bintally` crate.
//!
//! This module defines [`BinTallyError`], the unified error type returned by
//! every fallible operation in the crate. Variants carry the context needed to
//! report the failure to a user: file paths, frame numbers, and upstream
//! messages from FFmpeg, the image codecs, the zip writer, or the detector.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;
use zip::result::ZipError;

/// The unified error type for all `bintally` operations.
///
/// None of these are retried automatically. Fatal session conditions
/// (missing weights, unusable frame rate) are returned before any frame is
/// processed; per-frame read failures are reported through
/// [`StepOutcome::Skipped`](crate::StepOutcome::Skipped) instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BinTallyError {
    /// The detector weights file does not exist.
    #[error("Model weights not found at {0}")]
    ModelNotFound(PathBuf),

    /// The detector failed to load or to run inference.
    #[error("Detector error: {0}")]
    Detector(String),

    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::VideoFile::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// The frame rate is zero, negative, or could not be read, so no
    /// sampling interval can be derived from it.
    #[error("Unusable frame rate: {0}")]
    InvalidFrameRate(f64),

    /// The requested frame number exceeds the total frame count.
    #[error("Frame {frame_number} is out of range (video has {total_frames} frames)")]
    FrameOutOfRange {
        /// The frame number that was requested.
        frame_number: u64,
        /// The total number of frames in the video.
        total_frames: u64,
    },

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while decoding or encoding a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The capture archive could not be written.
    #[error("Archive error: {0}")]
    ArchiveError(String),

    /// A session option is outside its accepted range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<FfmpegError> for BinTallyError {
    fn from(error: FfmpegError) -> Self {
        BinTallyError::FfmpegError(error.to_string())
    }
}

impl From<ZipError> for BinTallyError {
    fn from(error: ZipError) -> Self {
        BinTallyError::ArchiveError(error.to_string())
    }
}
