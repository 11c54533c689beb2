//! The frame-source seam.
//!
//! A [`PlaybackSession`](crate::PlaybackSession) only needs three things from
//! a video: its nominal frame rate, its frame count, and random access to a
//! frame by index. [`VideoFile`](crate::VideoFile) provides them through
//! FFmpeg; tests and other callers can provide them from memory.

use image::RgbImage;

use crate::error::BinTallyError;

/// A decoded, randomly seekable sequence of RGB frames.
pub trait FrameSource {
    /// Nominal frames per second. Zero or non-finite means unknown.
    fn frames_per_second(&self) -> f64;

    /// Number of frames in the source.
    fn total_frames(&self) -> u64;

    /// Decode the frame at `index` (0-based).
    fn read_frame(&mut self, index: u64) -> Result<RgbImage, BinTallyError>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn frames_per_second(&self) -> f64 {
        (**self).frames_per_second()
    }

    fn total_frames(&self) -> u64 {
        (**self).total_frames()
    }

    fn read_frame(&mut self, index: u64) -> Result<RgbImage, BinTallyError> {
        (**self).read_frame(index)
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn frames_per_second(&self) -> f64 {
        (**self).frames_per_second()
    }

    fn total_frames(&self) -> u64 {
        (**self).total_frames()
    }

    fn read_frame(&mut self, index: u64) -> Result<RgbImage, BinTallyError> {
        (**self).read_frame(index)
    }
}
