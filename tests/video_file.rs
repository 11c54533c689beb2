//! FFmpeg frame source integration tests.
//!
//! Fixture-based tests return early when `tests/fixtures/sample_video.mp4`
//! is missing.

mod common;

use std::path::Path;

use bintally::{
    BinTallyError, FrameSource, PlaybackSession, SessionOptions, StepOutcome, VideoFile,
};
use common::ScriptedDetector;

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

#[test]
fn open_nonexistent_file() {
    let result = VideoFile::open("this_file_does_not_exist.mp4");
    let error = result.unwrap_err();
    assert!(matches!(error, BinTallyError::FileOpen { .. }));

    let error_message = error.to_string();
    assert!(
        error_message.contains("Failed to open media file"),
        "Error message should mention file open failure: {error_message}",
    );
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = VideoFile::open(&invalid_file_path);
    assert!(result.is_err(), "Expected error for invalid media file");
}

#[test]
fn probe_reports_stream_properties() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let metadata = VideoFile::probe(path).expect("Failed to probe test video");
    assert!(metadata.width > 0);
    assert!(metadata.height > 0);
    assert!(metadata.frames_per_second > 0.0);
    assert!(metadata.frame_count > 0);
    assert!(!metadata.codec.is_empty());
}

#[test]
fn frames_match_stream_dimensions() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut video = VideoFile::open(path).expect("Failed to open test video");
    let (width, height) = (video.metadata().width, video.metadata().height);

    let first = video.read_frame(0).expect("frame 0");
    assert_eq!(first.dimensions(), (width, height));

    // Sequential, then a backward seek, then a forward seek.
    video.read_frame(1).expect("frame 1");
    video.read_frame(0).expect("frame 0 after seek");
    let later = video.read_frame(video.total_frames() / 2).expect("middle frame");
    assert_eq!(later.dimensions(), (width, height));
}

#[test]
fn frame_out_of_range() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut video = VideoFile::open(path).expect("Failed to open test video");
    let total_frames = video.total_frames();
    let result = video.read_frame(total_frames);

    let error_message = result.unwrap_err().to_string();
    assert!(
        error_message.contains("out of range"),
        "Error message should mention out of range: {error_message}",
    );
}

#[test]
fn session_over_real_video_samples_at_interval() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let video = VideoFile::open(path).expect("Failed to open test video");
    let total_frames = video.total_frames();
    let mut detector = ScriptedDetector::new();
    let mut session =
        PlaybackSession::new(video, &mut detector, SessionOptions::new()).expect("session");
    let skip = session.skip();

    let mut sampled = 0;
    session.play();
    loop {
        match session.step().expect("step") {
            StepOutcome::Rendered(report) => {
                if report.sampled {
                    assert_eq!(report.frame_index % skip, 0);
                    sampled += 1;
                }
            }
            StepOutcome::Skipped { .. } => {}
            StepOutcome::Finished => break,
        }
    }

    assert!(sampled > 0);
    assert!(sampled <= total_frames.div_ceil(skip));
    assert_eq!(session.counters().total, 0);
    assert!(session.captures().is_empty());
}
