//! Frame annotation and thumbnail encoding.
//!
//! Boxes are drawn in place at the frame's own resolution; the `t=MM:SS`
//! overlay uses a small built-in bitmap font so no font file has to ship
//! with the crate.

use image::{Rgb, RgbImage, codecs::jpeg::JpegEncoder, imageops::FilterType};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut},
    rect::Rect,
};

use crate::detection::{BinClass, Detection};
use crate::error::BinTallyError;

/// JPEG quality used for thumbnails and annotated frames.
pub const JPEG_QUALITY: u8 = 85;

const BOX_THICKNESS: u32 = 2;
const OVERLAY_ORIGIN: (i32, i32) = (5, 5);
const OVERLAY_SIZE: (u32, u32) = (195, 40);
const GLYPH_SCALE: u32 = 3;
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// Format the position of `frame_index` in a stream at `frames_per_second`
/// as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_timestamp(frame_index: u64, frames_per_second: f64) -> String {
    let seconds = if frames_per_second > 0.0 && frames_per_second.is_finite() {
        (frame_index as f64 / frames_per_second).floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub fn class_color(class: BinClass) -> Rgb<u8> {
    match class {
        BinClass::Empty => Rgb([0, 200, 0]),
        BinClass::Full => Rgb([220, 0, 0]),
        BinClass::Unknown(_) => Rgb([240, 200, 0]),
    }
}

/// Draw one hollow rectangle per detection, clamped to the frame.
pub fn draw_detections(frame: &mut RgbImage, detections: &[Detection]) {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    for detection in detections {
        let bounding_box = detection.bounding_box.clamped(width, height);
        let color = class_color(detection.class);
        for inset in 0..BOX_THICKNESS {
            let inset_f = inset as f32;
            let rect_width = (bounding_box.width() - 2.0 * inset_f).round();
            let rect_height = (bounding_box.height() - 2.0 * inset_f).round();
            if rect_width < 1.0 || rect_height < 1.0 {
                break;
            }
            let rect = Rect::at(
                (bounding_box.x1 + inset_f).floor() as i32,
                (bounding_box.y1 + inset_f).floor() as i32,
            )
            .of_size(rect_width as u32, rect_height as u32);
            draw_hollow_rect_mut(frame, rect, color);
        }
    }
}

/// Draw a black box in the top-left corner holding `t=<timestamp>` in white.
pub fn draw_timestamp(frame: &mut RgbImage, timestamp: &str) {
    let (width, height) = frame.dimensions();
    let (origin_x, origin_y) = OVERLAY_ORIGIN;
    if width <= origin_x as u32 || height <= origin_y as u32 {
        return;
    }

    let box_width = OVERLAY_SIZE.0.min(width - origin_x as u32);
    let box_height = OVERLAY_SIZE.1.min(height - origin_y as u32);
    draw_filled_rect_mut(
        frame,
        Rect::at(origin_x, origin_y).of_size(box_width, box_height),
        Rgb([0, 0, 0]),
    );

    let text = format!("t={timestamp}");
    let mut cursor_x = origin_x + 5;
    let cursor_y = origin_y + ((OVERLAY_SIZE.1 - GLYPH_HEIGHT * GLYPH_SCALE) / 2) as i32;
    for character in text.chars() {
        draw_glyph(frame, character, cursor_x, cursor_y);
        cursor_x += ((GLYPH_WIDTH + 1) * GLYPH_SCALE) as i32;
    }
}

fn draw_glyph(frame: &mut RgbImage, character: char, x: i32, y: i32) {
    let Some(rows) = glyph(character) else {
        return;
    };
    for (row_index, row) in rows.iter().enumerate() {
        for column in 0..GLYPH_WIDTH {
            if row & (1 << (GLYPH_WIDTH - 1 - column)) == 0 {
                continue;
            }
            let rect = Rect::at(
                x + (column * GLYPH_SCALE) as i32,
                y + (row_index as u32 * GLYPH_SCALE) as i32,
            )
            .of_size(GLYPH_SCALE, GLYPH_SCALE);
            draw_filled_rect_mut(frame, rect, Rgb([255, 255, 255]));
        }
    }
}

/// 5×7 glyphs, one byte per row, most significant of the low five bits on
/// the left.
fn glyph(character: char) -> Option<[u8; 7]> {
    let rows = match character {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '=' => [0b00000, 0b00000, 0b11111, 0b00000, 0b11111, 0b00000, 0b00000],
        't' => [0b01000, 0b01000, 0b11100, 0b01000, 0b01000, 0b01001, 0b00110],
        _ => return None,
    };
    Some(rows)
}

/// Copy `frame`, draw the detections and the timestamp overlay onto the copy.
pub fn annotate_frame(frame: &RgbImage, detections: &[Detection], timestamp: &str) -> RgbImage {
    let mut annotated = frame.clone();
    draw_detections(&mut annotated, detections);
    draw_timestamp(&mut annotated, timestamp);
    annotated
}

/// Dimensions that fit `(width, height)` inside `(max_width, max_height)`
/// while preserving aspect ratio. Never upscales.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let scale = (max_width as f64 / width as f64)
        .min(max_height as f64 / height as f64)
        .min(1.0);
    let fitted_width = ((width as f64 * scale).round() as u32).max(1);
    let fitted_height = ((height as f64 * scale).round() as u32).max(1);
    (fitted_width, fitted_height)
}

/// Encode an RGB frame as JPEG.
pub fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>, BinTallyError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(frame)?;
    Ok(bytes)
}

/// Scale `frame` down to fit `(max_width, max_height)` and encode it as JPEG.
pub fn encode_thumbnail(
    frame: &RgbImage,
    max_width: u32,
    max_height: u32,
) -> Result<Vec<u8>, BinTallyError> {
    let (width, height) = frame.dimensions();
    let (thumb_width, thumb_height) = fit_within(width, height, max_width, max_height);
    if (thumb_width, thumb_height) == (width, height) {
        return encode_jpeg(frame);
    }
    let thumbnail = image::imageops::resize(frame, thumb_width, thumb_height, FilterType::Triangle);
    encode_jpeg(&thumbnail)
}
