//! Session configuration.
//!
//! [`SessionOptions`] is a builder that carries the user-adjustable settings
//! of a detection session (sampling interval, confidence threshold, capture
//! policy, display rate) together with the operational plumbing (progress
//! callback, cancellation token) without threading each of them through
//! every function signature.
//!
//! # Example
//!
//! ```no_run
//! use bintally::{CancellationToken, SessionOptions};
//!
//! let token = CancellationToken::new();
//! let options = SessionOptions::new()
//!     .with_sample_interval(2)
//!     .with_confidence_threshold(0.5)
//!     .with_capture_only_on_detection(false)
//!     .with_cancellation(token.clone());
//! options.validate().unwrap();
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use crate::error::BinTallyError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Accepted sampling intervals, in whole seconds.
pub const SAMPLE_INTERVAL_RANGE: RangeInclusive<u32> = 1..=60;

/// Accepted display rates, in frames per second.
pub const DISPLAY_FPS_RANGE: RangeInclusive<u32> = 1..=30;

/// Number of captures shown by [`recent_captures`](crate::PlaybackSession::recent_captures).
pub const RECENT_CAPTURE_LIMIT: usize = 24;

/// Settings for one detection session.
///
/// All values are fixed when the session starts; changing them requires a
/// new [`PlaybackSession`](crate::PlaybackSession).
#[derive(Clone)]
pub struct SessionOptions {
    /// Seconds of video between two frames sent to the detector.
    pub(crate) sample_interval_secs: u32,
    /// Minimum confidence for a detection to be kept.
    pub(crate) confidence_threshold: f32,
    /// When `true`, sampled frames without detections produce no capture.
    pub(crate) capture_only_on_detection: bool,
    /// Display rate used to pace [`run`](crate::PlaybackSession::run).
    pub(crate) display_fps: u32,
    /// When `false`, `run` does not sleep between steps.
    pub(crate) pacing: bool,
    /// Bounding box for capture thumbnails, `(width, height)`.
    pub(crate) thumbnail_size: (u32, u32),
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for SessionOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SessionOptions")
            .field("sample_interval_secs", &self.sample_interval_secs)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("capture_only_on_detection", &self.capture_only_on_detection)
            .field("display_fps", &self.display_fps)
            .field("pacing", &self.pacing)
            .field("thumbnail_size", &self.thumbnail_size)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionOptions {
    /// Create options with the default settings.
    ///
    /// Defaults: one sample per second, threshold 0.4, capture only on
    /// detection, 8 fps display rate without pacing, 320×200 thumbnails.
    pub fn new() -> Self {
        Self {
            sample_interval_secs: 1,
            confidence_threshold: 0.4,
            capture_only_on_detection: true,
            display_fps: 8,
            pacing: false,
            thumbnail_size: (320, 200),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Set the sampling interval in seconds (1 – 60).
    #[must_use]
    pub fn with_sample_interval(mut self, seconds: u32) -> Self {
        self.sample_interval_secs = seconds;
        self
    }

    /// Set the detector confidence threshold (0.0 – 1.0).
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Only capture sampled frames that contain at least one detection.
    #[must_use]
    pub fn with_capture_only_on_detection(mut self, only_on_detection: bool) -> Self {
        self.capture_only_on_detection = only_on_detection;
        self
    }

    /// Set the display rate in frames per second (1 – 30).
    #[must_use]
    pub fn with_display_fps(mut self, fps: u32) -> Self {
        self.display_fps = fps;
        self
    }

    /// Sleep `1 / display_fps` between steps in
    /// [`run`](crate::PlaybackSession::run).
    #[must_use]
    pub fn with_pacing(mut self, pacing: bool) -> Self {
        self.pacing = pacing;
        self
    }

    /// Set the bounding box capture thumbnails are scaled down into.
    ///
    /// Zero dimensions are clamped to 1.
    #[must_use]
    pub fn with_thumbnail_size(mut self, width: u32, height: u32) -> Self {
        self.thumbnail_size = (width.max(1), height.max(1));
        self
    }

    /// Attach a progress callback, invoked once per step.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token checked between steps.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn sample_interval_secs(&self) -> u32 {
        self.sample_interval_secs
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn capture_only_on_detection(&self) -> bool {
        self.capture_only_on_detection
    }

    pub fn display_fps(&self) -> u32 {
        self.display_fps
    }

    /// Delay between two displayed frames at the configured display rate.
    pub fn display_delay(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.display_fps.max(1)))
    }

    /// Check every setting against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`BinTallyError::InvalidConfiguration`] naming the first
    /// setting that is out of range.
    pub fn validate(&self) -> Result<(), BinTallyError> {
        if !SAMPLE_INTERVAL_RANGE.contains(&self.sample_interval_secs) {
            return Err(BinTallyError::InvalidConfiguration(format!(
                "sample interval must be between {} and {} seconds, got {}",
                SAMPLE_INTERVAL_RANGE.start(),
                SAMPLE_INTERVAL_RANGE.end(),
                self.sample_interval_secs
            )));
        }
        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return Err(BinTallyError::InvalidConfiguration(format!(
                "confidence threshold must be between 0.0 and 1.0, got {}",
                self.confidence_threshold
            )));
        }
        if !DISPLAY_FPS_RANGE.contains(&self.display_fps) {
            return Err(BinTallyError::InvalidConfiguration(format!(
                "display rate must be between {} and {} fps, got {}",
                DISPLAY_FPS_RANGE.start(),
                DISPLAY_FPS_RANGE.end(),
                self.display_fps
            )));
        }
        Ok(())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
