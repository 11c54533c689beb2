//! Detection types and the detector seam.
//!
//! The model itself is an external collaborator: anything that turns an RGB
//! frame into a list of [`Detection`]s can drive a session by implementing
//! [`Detector`]. The crate ships an ONNX implementation behind the `tract`
//! feature ([`TractDetector`](crate::TractDetector)).

use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FmtResult};

use image::RgbImage;

use crate::error::BinTallyError;

/// The two bin states the model recognises, plus a pass-through for any
/// other class id a model might emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinClass {
    /// Class id 0.
    Empty,
    /// Class id 1.
    Full,
    /// Any other class id. Not counted, labelled with its raw id.
    Unknown(u32),
}

impl BinClass {
    pub fn from_class_id(class_id: u32) -> Self {
        match class_id {
            0 => BinClass::Empty,
            1 => BinClass::Full,
            other => BinClass::Unknown(other),
        }
    }

    pub fn class_id(self) -> u32 {
        match self {
            BinClass::Empty => 0,
            BinClass::Full => 1,
            BinClass::Unknown(id) => id,
        }
    }

    /// Label used in capture names and captions.
    pub fn label(self) -> String {
        match self {
            BinClass::Empty => "empty".to_string(),
            BinClass::Full => "full".to_string(),
            BinClass::Unknown(id) => id.to_string(),
        }
    }
}

impl Display for BinClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.label())
    }
}

/// Axis-aligned box in pixel coordinates of the frame it was detected in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if intersection == 0.0 {
            return 0.0;
        }
        intersection / (self.area() + other.area() - intersection)
    }

    /// Clamp the box to `[0, width] × [0, height]`.
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }
}

/// One object found in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub class: BinClass,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

impl Detection {
    pub fn new(class: BinClass, confidence: f32, bounding_box: BoundingBox) -> Self {
        Self {
            class,
            confidence,
            bounding_box,
        }
    }
}

/// An object detector.
///
/// Implementations receive the decoded frame at its original dimensions and
/// must return boxes in that coordinate space, already filtered by
/// `confidence_threshold`.
pub trait Detector {
    /// Backend identifier, used in log output.
    fn name(&self) -> &str {
        "detector"
    }

    /// Run inference on one frame.
    fn infer(
        &mut self,
        frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, BinTallyError>;
}

impl<D: Detector + ?Sized> Detector for &mut D {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn infer(
        &mut self,
        frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, BinTallyError> {
        (**self).infer(frame, confidence_threshold)
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn infer(
        &mut self,
        frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, BinTallyError> {
        (**self).infer(frame, confidence_threshold)
    }
}

/// Greedy per-class non-maximum suppression.
///
/// Detections are visited in descending confidence order; a detection is
/// dropped when it overlaps an already kept detection of the same class by
/// more than `iou_threshold`.
pub fn non_maximum_suppression(
    mut detections: Vec<Detection>,
    iou_threshold: f32,
) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let overlaps = kept.iter().any(|existing| {
            existing.class == candidate.class
                && existing.bounding_box.iou(&candidate.bounding_box) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
