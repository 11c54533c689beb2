//! In-memory frame source and scripted detector shared by the integration
//! tests, so the sampling loop can be exercised without FFmpeg fixtures.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use bintally::{BinClass, BinTallyError, BoundingBox, Detection, Detector, FrameSource};
use image::{Rgb, RgbImage};

pub const FRAME_WIDTH: u32 = 64;
pub const FRAME_HEIGHT: u32 = 48;

/// Frames are solid colours that encode their own index, so the detector
/// can tell which frame it was given.
pub fn frame_for_index(index: u64) -> RgbImage {
    let pixel = Rgb([
        (index & 0xff) as u8,
        ((index >> 8) & 0xff) as u8,
        ((index >> 16) & 0xff) as u8,
    ]);
    RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, pixel)
}

pub fn index_of_frame(frame: &RgbImage) -> u64 {
    let pixel = frame.get_pixel(frame.width() - 1, frame.height() - 1);
    u64::from(pixel[0]) | (u64::from(pixel[1]) << 8) | (u64::from(pixel[2]) << 16)
}

pub struct SyntheticVideo {
    pub frames_per_second: f64,
    pub total_frames: u64,
    pub unreadable: HashSet<u64>,
    pub reads: Vec<u64>,
}

impl SyntheticVideo {
    pub fn new(frames_per_second: f64, total_frames: u64) -> Self {
        Self {
            frames_per_second,
            total_frames,
            unreadable: HashSet::new(),
            reads: Vec::new(),
        }
    }

    pub fn with_unreadable(mut self, index: u64) -> Self {
        self.unreadable.insert(index);
        self
    }
}

impl FrameSource for SyntheticVideo {
    fn frames_per_second(&self) -> f64 {
        self.frames_per_second
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn read_frame(&mut self, index: u64) -> Result<RgbImage, BinTallyError> {
        self.reads.push(index);
        if self.unreadable.contains(&index) {
            return Err(BinTallyError::VideoDecodeError(format!(
                "synthetic read failure at {index}"
            )));
        }
        if index >= self.total_frames {
            return Err(BinTallyError::FrameOutOfRange {
                frame_number: index,
                total_frames: self.total_frames,
            });
        }
        Ok(frame_for_index(index))
    }
}

/// Returns pre-scripted detections per frame index and records every call.
#[derive(Default)]
pub struct ScriptedDetector {
    pub script: HashMap<u64, Vec<Detection>>,
    pub failing: HashSet<u64>,
    pub calls: Vec<(u64, f32)>,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detections(mut self, index: u64, classes: &[u32]) -> Self {
        let detections = classes
            .iter()
            .enumerate()
            .map(|(offset, &class_id)| {
                let x = 4.0 + offset as f32 * 10.0;
                Detection::new(
                    BinClass::from_class_id(class_id),
                    0.9,
                    BoundingBox::new(x, 4.0, x + 8.0, 20.0),
                )
            })
            .collect();
        self.script.insert(index, detections);
        self
    }

    pub fn failing_at(mut self, index: u64) -> Self {
        self.failing.insert(index);
        self
    }

    pub fn called_indices(&self) -> Vec<u64> {
        self.calls.iter().map(|(index, _)| *index).collect()
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &str {
        "scripted"
    }

    fn infer(
        &mut self,
        frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, BinTallyError> {
        let index = index_of_frame(frame);
        self.calls.push((index, confidence_threshold));
        if self.failing.contains(&index) {
            return Err(BinTallyError::Detector(format!("scripted failure at {index}")));
        }
        Ok(self
            .script
            .get(&index)
            .map(|detections| {
                detections
                    .iter()
                    .copied()
                    .filter(|detection| detection.confidence >= confidence_threshold)
                    .collect()
            })
            .unwrap_or_default())
    }
}
