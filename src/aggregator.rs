//! Per-session tallies and captures.
//!
//! The [`Aggregator`] receives the detections of every sampled frame. It keeps
//! running [`Counters`] per class and an ordered list of [`Capture`]s, one per
//! sampled frame at most, regardless of how many objects the frame contains.

use std::collections::HashSet;

use crate::configuration::RECENT_CAPTURE_LIMIT;
use crate::detection::{BinClass, Detection};
use crate::error::BinTallyError;

/// Label of a capture taken from a frame without detections.
pub const NO_DETECTION_LABEL: &str = "none";

/// Separator between distinct class labels of a mixed frame.
pub const LABEL_SEPARATOR: &str = "+";

/// Running detection counts.
///
/// `total` always equals `empty + full`; detections of unknown classes are
/// not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub total: u64,
    pub empty: u64,
    pub full: u64,
}

impl Counters {
    fn count(&mut self, class: BinClass) {
        match class {
            BinClass::Empty => self.empty += 1,
            BinClass::Full => self.full += 1,
            BinClass::Unknown(_) => return,
        }
        self.total += 1;
    }
}

/// An annotated thumbnail kept for display and export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// JPEG bytes.
    pub thumbnail: Vec<u8>,
    pub label: String,
    pub frame_index: u64,
    /// Position in the video as `MM:SS`.
    pub timestamp: String,
}

impl Capture {
    /// Caption in the form `label — frame N @ MM:SS`.
    pub fn caption(&self) -> String {
        format!("{} — frame {} @ {}", self.label, self.frame_index, self.timestamp)
    }
}

/// What [`Aggregator::record`] did with a sampled frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureDecision {
    /// A capture was appended with this label.
    Captured { label: String },
    /// Counted, but no capture: the frame had no detections and captures
    /// are restricted to frames with detections.
    NoDetections,
    /// The frame index was already recorded; nothing was counted or captured.
    Duplicate,
}

/// Combined label for the detections of one frame: every distinct class
/// label in first-seen order, joined by `+`.
pub fn combined_label(detections: &[Detection]) -> String {
    let mut labels: Vec<String> = Vec::new();
    for detection in detections {
        let label = detection.class.label();
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    if labels.is_empty() {
        NO_DETECTION_LABEL.to_string()
    } else {
        labels.join(LABEL_SEPARATOR)
    }
}

/// Accumulates counters and captures for one session.
#[derive(Debug, Clone)]
pub struct Aggregator {
    counters: Counters,
    captures: Vec<Capture>,
    recorded_frames: HashSet<u64>,
    capture_only_on_detection: bool,
}

impl Aggregator {
    pub fn new(capture_only_on_detection: bool) -> Self {
        Self {
            counters: Counters::default(),
            captures: Vec::new(),
            recorded_frames: HashSet::new(),
            capture_only_on_detection,
        }
    }

    /// Record the detections of the sampled frame at `frame_index`.
    ///
    /// `thumbnail` is only invoked when a capture is actually taken.
    ///
    /// # Errors
    ///
    /// Propagates the error of `thumbnail`. In that case nothing is counted,
    /// and the frame is not marked as recorded.
    pub fn record<F>(
        &mut self,
        detections: &[Detection],
        frame_index: u64,
        timestamp: &str,
        thumbnail: F,
    ) -> Result<CaptureDecision, BinTallyError>
    where
        F: FnOnce() -> Result<Vec<u8>, BinTallyError>,
    {
        if self.recorded_frames.contains(&frame_index) {
            log::debug!("Frame {frame_index} already recorded, skipping");
            return Ok(CaptureDecision::Duplicate);
        }

        let capture = if detections.is_empty() && self.capture_only_on_detection {
            None
        } else {
            Some(Capture {
                thumbnail: thumbnail()?,
                label: combined_label(detections),
                frame_index,
                timestamp: timestamp.to_string(),
            })
        };

        self.recorded_frames.insert(frame_index);
        for detection in detections {
            self.counters.count(detection.class);
        }

        Ok(match capture {
            Some(capture) => {
                let label = capture.label.clone();
                self.captures.push(capture);
                CaptureDecision::Captured { label }
            }
            None => CaptureDecision::NoDetections,
        })
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// All captures, oldest first.
    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    /// At most `limit` captures, newest first.
    pub fn recent(&self, limit: usize) -> Vec<&Capture> {
        self.captures.iter().rev().take(limit).collect()
    }

    /// The display window of the most recent captures, newest first.
    pub fn recent_default(&self) -> Vec<&Capture> {
        self.recent(RECENT_CAPTURE_LIMIT)
    }

    pub fn is_recorded(&self, frame_index: u64) -> bool {
        self.recorded_frames.contains(&frame_index)
    }

    /// Clear counters, captures, and the dedup set.
    pub fn reset(&mut self) {
        self.counters = Counters::default();
        self.captures.clear();
        self.recorded_frames.clear();
    }
}
