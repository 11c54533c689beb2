//! FFmpeg-backed frame source.
//!
//! [`VideoFile`] opens a container, picks its best video stream, and keeps a
//! single decoder alive for the whole session. Reading the frame right after
//! the previously read one decodes forward without seeking; any other index
//! seeks to the nearest preceding keyframe and decodes up to the target.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::{
    error::BinTallyError, metadata::VideoMetadata, source::FrameSource, utilities,
};

/// An opened video file, exclusively owned by one playback session.
///
/// Dropping the handle releases the demuxer and decoder.
///
/// # Example
///
/// ```no_run
/// use bintally::{FrameSource, VideoFile};
///
/// let mut video = VideoFile::open("bins.mp4")?;
/// println!("{} frames at {:.2} fps", video.total_frames(), video.frames_per_second());
/// let first = video.read_frame(0)?;
/// first.save("first.png")?;
/// # Ok::<(), bintally::BinTallyError>(())
/// ```
pub struct VideoFile {
    input_context: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    stream_index: usize,
    time_base: Rational,
    /// PTS of the first frame in `time_base` units; frame 0 sits here.
    start_pts: i64,
    metadata: VideoMetadata,
    /// Index the decoder will produce next without a seek, if known.
    next_sequential: Option<u64>,
    end_of_stream: bool,
    file_path: PathBuf,
}

impl Debug for VideoFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoFile")
            .field("metadata", &self.metadata)
            .field("stream_index", &self.stream_index)
            .field("next_sequential", &self.next_sequential)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl VideoFile {
    /// Open a video file and prepare its best video stream for decoding.
    ///
    /// # Errors
    ///
    /// - [`BinTallyError::FileOpen`] if the file cannot be opened or its
    ///   codec parameters cannot be read.
    /// - [`BinTallyError::NoVideoStream`] if the file has no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BinTallyError> {
        let path = path.as_ref();
        let file_path = path.to_path_buf();

        log::debug!("Opening video file: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| BinTallyError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| BinTallyError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let (stream_index, time_base, start_pts, frames_per_second, header_frames, codec_parameters) = {
            let stream = input_context
                .streams()
                .best(Type::Video)
                .ok_or(BinTallyError::NoVideoStream)?;

            let frame_rate = stream.avg_frame_rate();
            let frames_per_second = if frame_rate.denominator() != 0 {
                f64::from(frame_rate.numerator()) / f64::from(frame_rate.denominator())
            } else {
                let rate = stream.rate();
                if rate.denominator() != 0 {
                    f64::from(rate.numerator()) / f64::from(rate.denominator())
                } else {
                    0.0
                }
            };

            (
                stream.index(),
                stream.time_base(),
                utilities::stream_start_pts(stream.start_time()),
                frames_per_second,
                stream.frames(),
                stream.parameters(),
            )
        };

        let decoder_context = CodecContext::from_parameters(codec_parameters).map_err(|error| {
            BinTallyError::FileOpen {
                path: file_path.clone(),
                reason: format!("Failed to read video codec parameters: {error}"),
            }
        })?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| BinTallyError::FileOpen {
                path: file_path.clone(),
                reason: format!("Failed to create video decoder: {error}"),
            })?;

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let frame_count = if header_frames > 0 {
            header_frames as u64
        } else if frames_per_second > 0.0 {
            (duration.as_secs_f64() * frames_per_second) as u64
        } else {
            0
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            duration,
            codec,
            format: input_context.format().name().to_string(),
        };

        let scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            metadata.width,
            metadata.height,
            ScalingFlags::BILINEAR,
        )?;

        log::debug!(
            "Video stream {stream_index}: {}x{} @ {:.3} fps, {} frames ({})",
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.frame_count,
            metadata.codec
        );

        Ok(Self {
            input_context,
            decoder,
            scaler,
            stream_index,
            time_base,
            start_pts,
            metadata,
            next_sequential: Some(0),
            end_of_stream: false,
            file_path,
        })
    }

    /// Open a file only to read its metadata.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<VideoMetadata, BinTallyError> {
        Self::open(path).map(|video| video.metadata)
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn seek_to(&mut self, frame_number: u64) -> Result<(), BinTallyError> {
        let fps = self.metadata.frames_per_second;
        if fps <= 0.0 {
            return Err(BinTallyError::InvalidFrameRate(fps));
        }
        let start_offset = utilities::pts_to_seconds(self.start_pts, self.time_base);
        let target = utilities::frame_number_to_seek_timestamp(frame_number, fps, start_offset);
        log::debug!("Seeking to frame {frame_number} (ts={target}us)");

        self.input_context.seek(target, ..target)?;
        self.decoder.flush();
        self.end_of_stream = false;
        Ok(())
    }

    fn next_video_packet(&mut self) -> Option<ffmpeg_next::Packet> {
        let stream_index = self.stream_index;
        self.input_context
            .packets()
            .find(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet)
    }

    fn to_image(&mut self, decoded: &VideoFrame) -> Result<RgbImage, BinTallyError> {
        let mut rgb_frame = VideoFrame::empty();
        self.scaler.run(decoded, &mut rgb_frame)?;
        let (width, height) = (self.metadata.width, self.metadata.height);
        let buffer = utilities::frame_to_rgb_buffer(&rgb_frame, width, height);
        RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            BinTallyError::VideoDecodeError(format!(
                "decoded buffer does not match {width}x{height}"
            ))
        })
    }

    /// Decode forward until a frame at or past `frame_number` appears.
    fn decode_until(&mut self, frame_number: u64) -> Result<RgbImage, BinTallyError> {
        let mut decoded = VideoFrame::empty();
        let fps = self.metadata.frames_per_second;

        loop {
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let pts = decoded.timestamp().or(decoded.pts()).unwrap_or(0);
                let current = utilities::pts_to_frame_number(pts, self.start_pts, self.time_base, fps);
                if current >= frame_number {
                    let image = self.to_image(&decoded)?;
                    self.next_sequential = Some(current + 1);
                    return Ok(image);
                }
            }

            if self.end_of_stream {
                break;
            }
            match self.next_video_packet() {
                Some(packet) => self.decoder.send_packet(&packet)?,
                None => {
                    self.decoder.send_eof()?;
                    self.end_of_stream = true;
                }
            }
        }

        self.next_sequential = None;
        Err(BinTallyError::VideoDecodeError(format!(
            "Could not locate frame {frame_number} in the video stream"
        )))
    }
}

impl FrameSource for VideoFile {
    fn frames_per_second(&self) -> f64 {
        self.metadata.frames_per_second
    }

    fn total_frames(&self) -> u64 {
        self.metadata.frame_count
    }

    fn read_frame(&mut self, index: u64) -> Result<RgbImage, BinTallyError> {
        let total_frames = self.metadata.frame_count;
        if index >= total_frames {
            return Err(BinTallyError::FrameOutOfRange {
                frame_number: index,
                total_frames,
            });
        }

        if self.next_sequential != Some(index) {
            self.seek_to(index)?;
        }
        self.decode_until(index)
    }
}
