//! Aggregator tests: counters, capture policy, labels, dedup.

use bintally::{
    Aggregator, BinClass, BinTallyError, BoundingBox, CaptureDecision, Detection,
    aggregator::combined_label,
};

fn detection(class_id: u32) -> Detection {
    Detection::new(
        BinClass::from_class_id(class_id),
        0.8,
        BoundingBox::new(0.0, 0.0, 10.0, 10.0),
    )
}

fn jpeg() -> Result<Vec<u8>, BinTallyError> {
    Ok(vec![0xff, 0xd8, 0xff, 0xd9])
}

#[test]
fn each_detection_is_counted() {
    let mut aggregator = Aggregator::new(true);
    aggregator
        .record(&[detection(0), detection(0), detection(1)], 0, "00:00", jpeg)
        .unwrap();

    let counters = aggregator.counters();
    assert_eq!(counters.empty, 2);
    assert_eq!(counters.full, 1);
    assert_eq!(counters.total, 3);
}

#[test]
fn many_detections_yield_one_capture() {
    let mut aggregator = Aggregator::new(true);
    let decision = aggregator
        .record(
            &[detection(1), detection(1), detection(1)],
            30,
            "00:01",
            jpeg,
        )
        .unwrap();

    assert_eq!(
        decision,
        CaptureDecision::Captured {
            label: "full".to_string()
        }
    );
    assert_eq!(aggregator.captures().len(), 1);
    let capture = &aggregator.captures()[0];
    assert_eq!(capture.frame_index, 30);
    assert_eq!(capture.timestamp, "00:01");
    assert_eq!(capture.thumbnail, jpeg().unwrap());
}

#[test]
fn mixed_classes_are_all_named_in_first_seen_order() {
    assert_eq!(combined_label(&[detection(1), detection(0), detection(1)]), "full+empty");
    assert_eq!(combined_label(&[detection(0), detection(1)]), "empty+full");
    assert_eq!(combined_label(&[detection(0), detection(9)]), "empty+9");
    assert_eq!(combined_label(&[]), "none");
}

#[test]
fn unknown_classes_are_captured_but_not_counted() {
    let mut aggregator = Aggregator::new(true);
    let decision = aggregator.record(&[detection(4)], 0, "00:00", jpeg).unwrap();
    assert_eq!(
        decision,
        CaptureDecision::Captured {
            label: "4".to_string()
        }
    );
    assert_eq!(aggregator.counters().total, 0);
}

#[test]
fn empty_frame_is_not_captured_when_restricted() {
    let mut aggregator = Aggregator::new(true);
    let mut thumbnail_requested = false;
    let decision = aggregator
        .record(&[], 0, "00:00", || {
            thumbnail_requested = true;
            jpeg()
        })
        .unwrap();

    assert_eq!(decision, CaptureDecision::NoDetections);
    assert!(!thumbnail_requested, "thumbnail must not be encoded");
    assert!(aggregator.captures().is_empty());
    assert!(aggregator.is_recorded(0));
}

#[test]
fn empty_frame_is_captured_when_capturing_everything() {
    let mut aggregator = Aggregator::new(false);
    let decision = aggregator.record(&[], 0, "00:00", jpeg).unwrap();
    assert_eq!(
        decision,
        CaptureDecision::Captured {
            label: "none".to_string()
        }
    );
    assert_eq!(aggregator.captures().len(), 1);
}

#[test]
fn frame_index_is_recorded_once() {
    let mut aggregator = Aggregator::new(true);
    aggregator.record(&[detection(0)], 60, "00:02", jpeg).unwrap();
    let second = aggregator
        .record(&[detection(0), detection(1)], 60, "00:02", jpeg)
        .unwrap();

    assert_eq!(second, CaptureDecision::Duplicate);
    assert_eq!(aggregator.captures().len(), 1);
    assert_eq!(aggregator.counters().total, 1);
}

#[test]
fn thumbnail_failure_leaves_state_untouched() {
    let mut aggregator = Aggregator::new(true);
    let result = aggregator.record(&[detection(0)], 0, "00:00", || {
        Err(BinTallyError::ArchiveError("encoder unavailable".to_string()))
    });
    assert!(result.is_err());
    assert_eq!(aggregator.counters().total, 0);
    assert!(!aggregator.is_recorded(0));

    aggregator.record(&[detection(0)], 0, "00:00", jpeg).unwrap();
    assert_eq!(aggregator.counters().total, 1);
}

#[test]
fn recent_returns_newest_first_and_is_bounded() {
    let mut aggregator = Aggregator::new(true);
    for index in 0..30 {
        aggregator
            .record(&[detection(1)], index * 10, "00:00", jpeg)
            .unwrap();
    }

    let recent = aggregator.recent_default();
    assert_eq!(recent.len(), 24);
    assert_eq!(recent[0].frame_index, 290);
    assert_eq!(recent[23].frame_index, 60);
    assert_eq!(aggregator.captures().len(), 30, "history is not truncated");

    assert_eq!(aggregator.recent(3).len(), 3);
}

#[test]
fn reset_clears_everything() {
    let mut aggregator = Aggregator::new(true);
    aggregator.record(&[detection(0)], 0, "00:00", jpeg).unwrap();
    aggregator.reset();

    assert_eq!(aggregator.counters().total, 0);
    assert!(aggregator.captures().is_empty());
    assert!(!aggregator.is_recorded(0));
}

#[test]
fn capture_caption_names_label_frame_and_time() {
    let mut aggregator = Aggregator::new(true);
    aggregator.record(&[detection(0)], 120, "00:04", jpeg).unwrap();
    assert_eq!(
        aggregator.captures()[0].caption(),
        "empty — frame 120 @ 00:04"
    );
}
