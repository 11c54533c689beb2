//! The sampler/player loop.
//!
//! A [`PlaybackSession`] advances through a [`FrameSource`] one frame per
//! [`step`](PlaybackSession::step). Every `skip`-th frame, where
//! `skip = round(fps × sample_interval)`, is sent to the [`Detector`],
//! annotated, and handed to the [`Aggregator`]. Frames in between reuse the
//! last annotated frame so a display never goes blank between samples.
//!
//! The session never runs on its own. A caller drives it either step by step
//! (a UI timer, a test) or with [`run`](PlaybackSession::run), which loops
//! until the source is exhausted and checks the cancellation token between
//! steps.
//!
//! # Example
//!
//! ```no_run
//! use bintally::{PlaybackSession, SessionOptions, TractDetector, VideoFile};
//!
//! let video = VideoFile::open("bins.mp4")?;
//! let detector = TractDetector::load("best.onnx")?;
//! let options = SessionOptions::new().with_sample_interval(2);
//!
//! let mut session = PlaybackSession::new(video, detector, options)?;
//! let summary = session.run()?;
//! println!("{} full, {} empty", summary.counters.full, summary.counters.empty);
//! # Ok::<(), bintally::BinTallyError>(())
//! ```

use image::RgbImage;

use crate::aggregator::{Aggregator, Capture, CaptureDecision, Counters, combined_label};
use crate::annotate;
use crate::configuration::{RECENT_CAPTURE_LIMIT, SessionOptions};
use crate::detection::{Detection, Detector};
use crate::error::BinTallyError;
use crate::progress::{OperationType, ProgressTracker};
use crate::source::FrameSource;

/// Mutable playback position of one session.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub frame_index: u64,
    pub paused: bool,
    pub total_frames: u64,
    pub frames_per_second: f64,
    /// Frame currently on display: the last annotated frame, or the raw
    /// frame if nothing has been sampled yet.
    pub last_annotated_frame: Option<RgbImage>,
}

impl PlaybackState {
    pub fn is_finished(&self) -> bool {
        self.frame_index >= self.total_frames
    }

    /// Fraction of the video played, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_frames == 0 {
            return 1.0;
        }
        ((self.frame_index + 1) as f64 / self.total_frames as f64).min(1.0)
    }
}

/// Details of one rendered step.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Index of the frame that was rendered.
    pub frame_index: u64,
    /// Whether the detector ran on this frame.
    pub sampled: bool,
    /// Detections of this frame; empty for frames that were not sampled.
    pub detections: Vec<Detection>,
    /// Aggregator outcome, for sampled frames.
    pub capture: Option<CaptureDecision>,
    /// Position of the frame as `MM:SS`.
    pub timestamp: String,
}

/// Result of one call to [`PlaybackSession::step`].
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// A frame was rendered.
    Rendered(StepReport),
    /// The frame could not be read. The index has moved past it.
    Skipped { frame_index: u64, reason: String },
    /// The end of the source was reached; nothing was sampled.
    Finished,
}

/// Totals of a completed [`run`](PlaybackSession::run).
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Frames rendered (sampled or reused).
    pub frames_processed: u64,
    pub sampled_frames: u64,
    pub skipped_frames: u64,
    pub counters: Counters,
    pub capture_count: usize,
}

/// Number of frames between two samples: `round(fps × interval)`, at least 1.
///
/// # Errors
///
/// Returns [`BinTallyError::InvalidFrameRate`] when `frames_per_second` is
/// zero, negative, or not finite.
pub fn sample_skip(frames_per_second: f64, sample_interval_secs: u32) -> Result<u64, BinTallyError> {
    if !frames_per_second.is_finite() || frames_per_second <= 0.0 {
        return Err(BinTallyError::InvalidFrameRate(frames_per_second));
    }
    let skip = (frames_per_second * f64::from(sample_interval_secs)).round() as u64;
    Ok(skip.max(1))
}

/// One upload-to-completion detection run over a frame source.
pub struct PlaybackSession<S, D> {
    source: S,
    detector: D,
    options: SessionOptions,
    state: PlaybackState,
    aggregator: Aggregator,
    skip: u64,
    sampled_frames: u64,
    skipped_frames: u64,
    rendered_frames: u64,
}

impl<S: FrameSource, D: Detector> PlaybackSession<S, D> {
    /// Start a session, paused at frame 0 with empty counters.
    ///
    /// # Errors
    ///
    /// - [`BinTallyError::InvalidConfiguration`] if `options` fail validation.
    /// - [`BinTallyError::InvalidFrameRate`] if the source has no usable
    ///   frame rate. This is fatal for the session.
    pub fn new(source: S, detector: D, options: SessionOptions) -> Result<Self, BinTallyError> {
        options.validate()?;
        let frames_per_second = source.frames_per_second();
        let skip = sample_skip(frames_per_second, options.sample_interval_secs)?;
        let total_frames = source.total_frames();

        log::debug!(
            "New session: {total_frames} frames @ {frames_per_second:.3} fps, sampling every {skip} frame(s) with {}",
            detector.name()
        );

        Ok(Self {
            aggregator: Aggregator::new(options.capture_only_on_detection),
            state: PlaybackState {
                frame_index: 0,
                paused: true,
                total_frames,
                frames_per_second,
                last_annotated_frame: None,
            },
            source,
            detector,
            options,
            skip,
            sampled_frames: 0,
            skipped_frames: 0,
            rendered_frames: 0,
        })
    }

    /// Render the frame at the current index and advance if playing.
    ///
    /// # Errors
    ///
    /// A detector or thumbnail-encoding failure on a sampled frame is
    /// returned as-is and the index does not move; the caller decides
    /// whether to halt or [`step_forward`](Self::step_forward).
    pub fn step(&mut self) -> Result<StepOutcome, BinTallyError> {
        if self.state.is_finished() {
            self.state.paused = true;
            return Ok(StepOutcome::Finished);
        }

        let frame_index = self.state.frame_index;
        let frame = match self.source.read_frame(frame_index) {
            Ok(frame) => frame,
            Err(error) => {
                log::warn!("Could not read frame {frame_index}: {error}");
                self.skipped_frames += 1;
                self.advance_by_one();
                return Ok(StepOutcome::Skipped {
                    frame_index,
                    reason: error.to_string(),
                });
            }
        };

        let timestamp = annotate::format_timestamp(frame_index, self.state.frames_per_second);
        let sampled = frame_index % self.skip == 0;
        let mut detections = Vec::new();
        let mut capture = None;

        if sampled {
            detections = self
                .detector
                .infer(&frame, self.options.confidence_threshold)?;
            let annotated = annotate::annotate_frame(&frame, &detections, &timestamp);

            let (max_width, max_height) = self.options.thumbnail_size;
            let decision = self.aggregator.record(&detections, frame_index, &timestamp, || {
                annotate::encode_thumbnail(&annotated, max_width, max_height)
            })?;
            log::debug!(
                "Sampled frame {frame_index} @ {timestamp}: {} detection(s) [{}], {decision:?}",
                detections.len(),
                combined_label(&detections)
            );

            self.state.last_annotated_frame = Some(annotated);
            self.sampled_frames += 1;
            capture = Some(decision);
        } else if self.state.last_annotated_frame.is_none() {
            self.state.last_annotated_frame = Some(frame);
        }

        self.rendered_frames += 1;
        if !self.state.paused {
            self.advance_by_one();
        }

        Ok(StepOutcome::Rendered(StepReport {
            frame_index,
            sampled,
            detections,
            capture,
            timestamp,
        }))
    }

    /// Play to the end of the source.
    ///
    /// Resumes playback, then calls [`step`](Self::step) until it reports
    /// [`StepOutcome::Finished`]. Between steps the cancellation token is
    /// checked, the progress callback fires, and, with pacing enabled, the
    /// loop sleeps for one display interval.
    ///
    /// # Errors
    ///
    /// [`BinTallyError::Cancelled`] if the token fires (state is kept, so
    /// the session can be resumed), or any error from `step`.
    pub fn run(&mut self) -> Result<SessionSummary, BinTallyError> {
        self.play();
        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::Playback,
            Some(self.state.total_frames),
        );
        let delay = self.options.display_delay();

        loop {
            if self.options.is_cancelled() {
                self.pause();
                return Err(BinTallyError::Cancelled);
            }

            match self.step()? {
                StepOutcome::Finished => break,
                StepOutcome::Rendered(report) => {
                    tracker.advance(Some(report.frame_index), Some(self.aggregator.counters().total));
                }
                StepOutcome::Skipped { frame_index, .. } => {
                    tracker.advance(Some(frame_index), Some(self.aggregator.counters().total));
                }
            }

            if self.options.pacing {
                std::thread::sleep(delay);
            }
        }

        let summary = self.summary();
        log::info!(
            "Session finished: {} frame(s), {} sampled, {} skipped, {} detection(s) ({} empty, {} full), {} capture(s)",
            summary.frames_processed,
            summary.sampled_frames,
            summary.skipped_frames,
            summary.counters.total,
            summary.counters.empty,
            summary.counters.full,
            summary.capture_count
        );
        Ok(summary)
    }

    pub fn play(&mut self) {
        self.state.paused = false;
    }

    pub fn pause(&mut self) {
        self.state.paused = true;
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    /// Pause and move one frame forward, never past the end.
    pub fn step_forward(&mut self) {
        self.pause();
        self.advance_by_one();
    }

    /// Pause and move one frame back, never before frame 0.
    ///
    /// Replaying an already sampled frame neither recounts nor recaptures it.
    pub fn step_back(&mut self) {
        self.pause();
        self.state.frame_index = self.state.frame_index.saturating_sub(1);
    }

    /// Rewind to frame 0 and clear counters, captures, and the display frame.
    pub fn restart(&mut self) {
        self.state.frame_index = 0;
        self.state.paused = true;
        self.state.last_annotated_frame = None;
        self.aggregator.reset();
        self.sampled_frames = 0;
        self.skipped_frames = 0;
        self.rendered_frames = 0;
    }

    fn advance_by_one(&mut self) {
        self.state.frame_index = (self.state.frame_index + 1).min(self.state.total_frames);
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            frames_processed: self.rendered_frames,
            sampled_frames: self.sampled_frames,
            skipped_frames: self.skipped_frames,
            counters: self.aggregator.counters(),
            capture_count: self.aggregator.captures().len(),
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn counters(&self) -> Counters {
        self.aggregator.counters()
    }

    pub fn captures(&self) -> &[Capture] {
        self.aggregator.captures()
    }

    /// The most recent captures, newest first.
    pub fn recent_captures(&self) -> Vec<&Capture> {
        self.aggregator.recent(RECENT_CAPTURE_LIMIT)
    }

    pub fn display_frame(&self) -> Option<&RgbImage> {
        self.state.last_annotated_frame.as_ref()
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// End the session, releasing the source and detector.
    pub fn into_aggregator(self) -> Aggregator {
        self.aggregator
    }
}

/// Result of running the detector on a single still image.
#[derive(Debug, Clone)]
pub struct ImageReport {
    pub annotated: RgbImage,
    pub detections: Vec<Detection>,
    /// Combined label of all detections, `none` when there are none.
    pub label: String,
}

/// Run one detection pass on a still image and draw the boxes on a copy.
///
/// Still images do not take part in session counters.
pub fn detect_image<D: Detector>(
    detector: &mut D,
    image: &RgbImage,
    options: &SessionOptions,
) -> Result<ImageReport, BinTallyError> {
    options.validate()?;
    let detections = detector.infer(image, options.confidence_threshold)?;
    let mut annotated = image.clone();
    annotate::draw_detections(&mut annotated, &detections);
    log::debug!(
        "Image {}x{}: {} detection(s)",
        image.width(),
        image.height(),
        detections.len()
    );
    Ok(ImageReport {
        label: combined_label(&detections),
        annotated,
        detections,
    })
}
