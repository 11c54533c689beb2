//! Video metadata.
//!
//! Extracted once when a [`VideoFile`](crate::VideoFile) is opened and cached
//! for the lifetime of the handle.

use std::time::Duration;

/// Metadata for the video stream a session plays.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    /// Zero when the container does not report a usable rate.
    pub frames_per_second: f64,
    /// Total number of frames, from the stream header when present,
    /// otherwise estimated from duration and frame rate.
    pub frame_count: u64,
    /// Container duration.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`, `"mpeg4"`).
    pub codec: String,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`, `"avi"`).
    pub format: String,
}
