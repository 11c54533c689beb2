//! SessionOptions builder and validation tests.

use std::time::Duration;

use bintally::{BinTallyError, CancellationToken, SessionOptions};

#[test]
fn defaults() {
    let options = SessionOptions::new();
    assert_eq!(options.sample_interval_secs(), 1);
    assert!((options.confidence_threshold() - 0.4).abs() < f32::EPSILON);
    assert!(options.capture_only_on_detection());
    assert_eq!(options.display_fps(), 8);
    assert!(options.validate().is_ok());

    let debug = format!("{options:?}");
    assert!(debug.contains("SessionOptions"));
    assert!(debug.contains("has_cancellation: false"));
    assert!(debug.contains("thumbnail_size: (320, 200)"));
}

#[test]
fn builder_sets_every_field() {
    let options = SessionOptions::new()
        .with_sample_interval(10)
        .with_confidence_threshold(0.25)
        .with_capture_only_on_detection(false)
        .with_display_fps(30)
        .with_pacing(true)
        .with_thumbnail_size(0, 90)
        .with_cancellation(CancellationToken::new());

    assert_eq!(options.sample_interval_secs(), 10);
    assert!((options.confidence_threshold() - 0.25).abs() < f32::EPSILON);
    assert!(!options.capture_only_on_detection());
    assert_eq!(options.display_fps(), 30);
    assert!(options.validate().is_ok());

    let debug = format!("{options:?}");
    assert!(debug.contains("pacing: true"));
    assert!(debug.contains("thumbnail_size: (1, 90)"));
    assert!(debug.contains("has_cancellation: true"));
}

#[test]
fn display_delay_matches_rate() {
    let options = SessionOptions::new().with_display_fps(4);
    assert_eq!(options.display_delay(), Duration::from_millis(250));
}

#[test]
fn interval_bounds() {
    assert!(SessionOptions::new().with_sample_interval(1).validate().is_ok());
    assert!(SessionOptions::new().with_sample_interval(60).validate().is_ok());
    for interval in [0, 61, 3600] {
        let result = SessionOptions::new().with_sample_interval(interval).validate();
        assert!(
            matches!(result, Err(BinTallyError::InvalidConfiguration(ref message)) if message.contains("sample interval")),
            "interval {interval} should be rejected: {result:?}"
        );
    }
}

#[test]
fn threshold_bounds() {
    assert!(SessionOptions::new().with_confidence_threshold(0.0).validate().is_ok());
    assert!(SessionOptions::new().with_confidence_threshold(1.0).validate().is_ok());
    for threshold in [-0.1, 1.01, f32::NAN, f32::INFINITY] {
        let result = SessionOptions::new()
            .with_confidence_threshold(threshold)
            .validate();
        assert!(
            matches!(result, Err(BinTallyError::InvalidConfiguration(ref message)) if message.contains("confidence")),
            "threshold {threshold} should be rejected"
        );
    }
}

#[test]
fn display_rate_bounds() {
    assert!(SessionOptions::new().with_display_fps(1).validate().is_ok());
    assert!(SessionOptions::new().with_display_fps(30).validate().is_ok());
    assert!(SessionOptions::new().with_display_fps(0).validate().is_err());
    assert!(SessionOptions::new().with_display_fps(31).validate().is_err());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    token.cancel();
    assert!(clone.is_cancelled());
    assert!(!CancellationToken::default().is_cancelled());
}

#[test]
fn ffmpeg_log_level_names() {
    use bintally::FfmpegLogLevel;

    assert_eq!(FfmpegLogLevel::parse("warn"), Some(FfmpegLogLevel::Warning));
    assert_eq!(FfmpegLogLevel::parse("ERROR"), Some(FfmpegLogLevel::Error));
    assert_eq!(FfmpegLogLevel::parse("loud"), None);
}
