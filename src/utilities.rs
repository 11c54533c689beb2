//! Internal utility functions.
//!
//! Helpers for pixel-data copying and timestamp conversion shared by the
//! FFmpeg frame source.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy an RGB24 FFmpeg frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 3).
/// The result can be passed directly to [`image::RgbImage::from_raw`].
pub(crate) fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * f64::from(time_base.numerator()) / f64::from(time_base.denominator())
}

/// Stream start time as a PTS, with "unknown" (`AV_NOPTS_VALUE`) read as 0.
pub(crate) fn stream_start_pts(start_time: i64) -> i64 {
    if start_time == i64::MIN { 0 } else { start_time }
}

/// Rescale a PTS value to the nearest frame index, counting from the
/// stream's first frame at `start_pts`.
pub(crate) fn pts_to_frame_number(
    pts: i64,
    start_pts: i64,
    time_base: Rational,
    frames_per_second: f64,
) -> u64 {
    let seconds = pts_to_seconds(pts.saturating_sub(start_pts), time_base).max(0.0);
    (seconds * frames_per_second).round() as u64
}

/// Convert a frame index to a seek timestamp in AV_TIME_BASE (microseconds),
/// the unit `Input::seek` expects for container-level seeking. Container
/// timestamps include the stream's start offset, in seconds.
pub(crate) fn frame_number_to_seek_timestamp(
    frame_number: u64,
    frames_per_second: f64,
    start_offset_seconds: f64,
) -> i64 {
    let seconds = frame_number as f64 / frames_per_second + start_offset_seconds;
    (seconds * 1_000_000.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_numbers_count_from_stream_start() {
        let time_base = Rational::new(1, 90_000);
        // First frame presented at 1.5 s, 30 fps.
        let start_pts = 135_000;

        assert_eq!(pts_to_frame_number(135_000, start_pts, time_base, 30.0), 0);
        assert_eq!(pts_to_frame_number(138_000, start_pts, time_base, 30.0), 1);
        assert_eq!(pts_to_frame_number(225_000, start_pts, time_base, 30.0), 30);
        assert_eq!(pts_to_frame_number(0, start_pts, time_base, 30.0), 0);
    }

    #[test]
    fn seek_target_includes_start_offset() {
        assert_eq!(frame_number_to_seek_timestamp(30, 30.0, 0.0), 1_000_000);
        assert_eq!(frame_number_to_seek_timestamp(30, 30.0, 1.5), 2_500_000);
    }

    #[test]
    fn unknown_start_time_reads_as_zero() {
        assert_eq!(stream_start_pts(i64::MIN), 0);
        assert_eq!(stream_start_pts(3_003), 3_003);
    }
}
