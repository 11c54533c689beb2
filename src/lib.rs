//! # bintally
//!
//! Sample frames from a video, detect full and empty waste bins, tally them,
//! and export the annotated frames.
//!
//! `bintally` decodes video through FFmpeg (via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate), sends one
//! frame every N seconds to an object detector, draws the detected boxes and
//! a `t=MM:SS` overlay, keeps per-class counters, and collects one JPEG
//! thumbnail per sampled frame that can be exported as a zip archive.
//!
//! ## Quick Start
//!
//! ### Run a whole video
//!
//! ```no_run
//! use bintally::{PlaybackSession, SessionOptions, TractDetector, VideoFile};
//!
//! let video = VideoFile::open("bins.mp4")?;
//! let detector = TractDetector::load("best.onnx")?;
//! let mut session = PlaybackSession::new(video, detector, SessionOptions::new())?;
//!
//! let summary = session.run()?;
//! println!("total={} empty={} full={}",
//!     summary.counters.total, summary.counters.empty, summary.counters.full);
//!
//! bintally::export::write_archive(session.captures(), "captures.zip")?;
//! # Ok::<(), bintally::BinTallyError>(())
//! ```
//!
//! ### Drive the loop yourself
//!
//! ```no_run
//! use bintally::{PlaybackSession, SessionOptions, StepOutcome, TractDetector, VideoFile};
//!
//! let video = VideoFile::open("bins.mp4")?;
//! let detector = TractDetector::load("best.onnx")?;
//! let mut session = PlaybackSession::new(video, detector, SessionOptions::new())?;
//!
//! session.play();
//! while let StepOutcome::Rendered(_) | StepOutcome::Skipped { .. } = session.step()? {
//!     if let Some(frame) = session.display_frame() {
//!         // hand `frame` to a display
//!         let _ = frame;
//!     }
//! }
//! # Ok::<(), bintally::BinTallyError>(())
//! ```
//!
//! ## Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `tract` | ONNX inference backend ([`TractDetector`]) via `tract-onnx` (default) |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod aggregator;
pub mod annotate;
pub mod configuration;
pub mod detection;
pub mod error;
pub mod export;
pub mod ffmpeg;
pub mod metadata;
pub mod playback;
pub mod progress;
pub mod source;
#[cfg(feature = "tract")]
pub mod tract;
mod utilities;
pub mod video;

pub use aggregator::{Aggregator, Capture, CaptureDecision, Counters};
pub use configuration::SessionOptions;
pub use detection::{BinClass, BoundingBox, Detection, Detector};
pub use error::BinTallyError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use metadata::VideoMetadata;
pub use playback::{
    ImageReport, PlaybackSession, PlaybackState, SessionSummary, StepOutcome, StepReport,
    detect_image,
};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use source::FrameSource;
#[cfg(feature = "tract")]
pub use tract::TractDetector;
pub use video::VideoFile;
