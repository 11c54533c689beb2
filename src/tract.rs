//! ONNX detector backend built on `tract-onnx`.
//!
//! Loads a YOLOv8-style export whose single output has shape
//! `[1, 4 + classes, proposals]`: rows 0–3 hold `(cx, cy, w, h)` in model
//! input pixels, the remaining rows hold per-class scores.

use std::path::Path;

use image::{RgbImage, imageops::FilterType};
use tract_onnx::prelude::*;

use crate::detection::{
    BinClass, BoundingBox, Detection, Detector, non_maximum_suppression,
};
use crate::error::BinTallyError;

/// Square input size of the exported model.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// IoU above which two same-class boxes are merged.
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// Detector backed by a local ONNX model.
///
/// No network I/O; the model file is read once in
/// [`load`](TractDetector::load).
pub struct TractDetector {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    iou_threshold: f32,
}

impl TractDetector {
    /// Load a model with the default 640×640 input.
    ///
    /// # Errors
    ///
    /// - [`BinTallyError::ModelNotFound`] if `model_path` does not exist.
    /// - [`BinTallyError::Detector`] if the model cannot be parsed or
    ///   optimised.
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self, BinTallyError> {
        Self::load_with_input_size(model_path, DEFAULT_INPUT_SIZE)
    }

    /// Load a model exported with a non-default square input size.
    pub fn load_with_input_size<P: AsRef<Path>>(
        model_path: P,
        input_size: u32,
    ) -> Result<Self, BinTallyError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(BinTallyError::ModelNotFound(model_path.to_path_buf()));
        }

        log::debug!(
            "Loading ONNX model {} (input {input_size}x{input_size})",
            model_path.display()
        );

        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|error| {
                BinTallyError::Detector(format!(
                    "failed to load ONNX model from {}: {error:#}",
                    model_path.display()
                ))
            })?;

        Ok(Self {
            model,
            input_size,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        })
    }

    /// Override the IoU threshold used for non-maximum suppression.
    #[must_use]
    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &RgbImage) -> Tensor {
        let side = self.input_size;
        let resized = image::imageops::resize(frame, side, side, FilterType::Triangle);
        let side = side as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        })
        .into_tensor()
    }

    fn decode_output(
        &self,
        output: &Tensor,
        frame_width: u32,
        frame_height: u32,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, BinTallyError> {
        let view = output.to_array_view::<f32>().map_err(|error| {
            BinTallyError::Detector(format!("model output tensor was not f32: {error}"))
        })?;
        decode_yolo_output(
            view,
            self.input_size,
            frame_width,
            frame_height,
            confidence_threshold,
            self.iou_threshold,
        )
    }
}

/// Turn a raw `[1, 4 + classes, proposals]` output into detections on a
/// `frame_width`×`frame_height` frame.
///
/// Each proposal keeps its best-scoring class; proposals under
/// `confidence_threshold` are dropped. Boxes are converted from
/// `(cx, cy, w, h)` in `input_size` model pixels to corners in frame pixels,
/// clamped to the frame, then merged with
/// [`non_maximum_suppression`] at `iou_threshold`.
///
/// # Errors
///
/// [`BinTallyError::Detector`] when the output does not have three axes or
/// carries no class rows.
pub fn decode_yolo_output(
    output: tract_ndarray::ArrayViewD<'_, f32>,
    input_size: u32,
    frame_width: u32,
    frame_height: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
) -> Result<Vec<Detection>, BinTallyError> {
    let shape = output.shape();
    if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
        return Err(BinTallyError::Detector(format!(
            "unexpected model output shape {shape:?}"
        )));
    }
    let rows = shape[1];
    let proposals = shape[2];

    let scale_x = frame_width as f32 / input_size as f32;
    let scale_y = frame_height as f32 / input_size as f32;

    let mut candidates = Vec::new();
    for i in 0..proposals {
        let (best_class, best_score) = (4..rows)
            .map(|row| (row - 4, output[[0, row, i]]))
            .fold((0, f32::NEG_INFINITY), |best, current| {
                if current.1 > best.1 { current } else { best }
            });
        if !best_score.is_finite() || best_score < confidence_threshold {
            continue;
        }

        let cx = output[[0, 0, i]];
        let cy = output[[0, 1, i]];
        let w = output[[0, 2, i]];
        let h = output[[0, 3, i]];
        let bounding_box = BoundingBox::new(
            (cx - w / 2.0) * scale_x,
            (cy - h / 2.0) * scale_y,
            (cx + w / 2.0) * scale_x,
            (cy + h / 2.0) * scale_y,
        )
        .clamped(frame_width, frame_height);

        candidates.push(Detection::new(
            BinClass::from_class_id(best_class as u32),
            best_score.min(1.0),
            bounding_box,
        ));
    }

    Ok(non_maximum_suppression(candidates, iou_threshold))
}

impl Detector for TractDetector {
    fn name(&self) -> &str {
        "tract"
    }

    fn infer(
        &mut self,
        frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, BinTallyError> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|error| BinTallyError::Detector(format!("ONNX inference failed: {error:#}")))?;
        let output = outputs
            .first()
            .ok_or_else(|| BinTallyError::Detector("model produced no outputs".to_string()))?;

        self.decode_output(output, frame.width(), frame.height(), confidence_threshold)
    }
}
