//! Benchmarks for the per-sample work: annotation, thumbnail encoding,
//! archive export, and frame reads.
//!
//! Run with: cargo bench
//!
//! The frame-read benchmark needs `tests/fixtures/sample_video.mp4` and is
//! skipped without it.

use std::{hint::black_box, path::Path};

use bintally::{
    BinClass, BoundingBox, Capture, Detection, FrameSource, VideoFile,
    annotate::{annotate_frame, encode_thumbnail},
    export,
};
use criterion::Criterion;
use ffmpeg_next::util::log::Level as LogLevel;
use image::{Rgb, RgbImage};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn full_hd_frame() -> RgbImage {
    RgbImage::from_fn(1920, 1080, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

fn sample_detections() -> Vec<Detection> {
    (0..8)
        .map(|i| {
            let x = 100.0 + i as f32 * 200.0;
            Detection::new(
                BinClass::from_class_id(i % 2),
                0.8,
                BoundingBox::new(x, 300.0, x + 150.0, 700.0),
            )
        })
        .collect()
}

fn benchmark_annotation(criterion: &mut Criterion) {
    let frame = full_hd_frame();
    let detections = sample_detections();

    criterion.bench_function("annotate 1080p frame (8 boxes)", |bencher| {
        bencher.iter(|| annotate_frame(black_box(&frame), black_box(&detections), "12:34"));
    });
}

fn benchmark_thumbnail(criterion: &mut Criterion) {
    let frame = full_hd_frame();

    criterion.bench_function("encode 320x200 thumbnail from 1080p", |bencher| {
        bencher.iter(|| encode_thumbnail(black_box(&frame), 320, 200).unwrap());
    });
}

fn benchmark_archive(criterion: &mut Criterion) {
    let thumbnail = encode_thumbnail(&full_hd_frame(), 320, 200).unwrap();
    let captures: Vec<Capture> = (0..100)
        .map(|i| Capture {
            thumbnail: thumbnail.clone(),
            label: "full".to_string(),
            frame_index: i * 30,
            timestamp: "00:00".to_string(),
        })
        .collect();

    criterion.bench_function("zip 100 captures", |bencher| {
        bencher.iter(|| export::to_archive(black_box(&captures)).unwrap());
    });
}

fn benchmark_frame_reads(criterion: &mut Criterion) {
    ffmpeg_next::util::log::set_level(LogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    criterion.bench_function("read 30 sequential frames", |bencher| {
        bencher.iter(|| {
            let mut video = VideoFile::open(SAMPLE_VIDEO).unwrap();
            for index in 0..30.min(video.total_frames()) {
                let _frame = video.read_frame(index).unwrap();
            }
        });
    });

    criterion.bench_function("read every 30th frame (seeking)", |bencher| {
        bencher.iter(|| {
            let mut video = VideoFile::open(SAMPLE_VIDEO).unwrap();
            let total_frames = video.total_frames();
            for index in (0..total_frames).step_by(30) {
                let _frame = video.read_frame(index).unwrap();
            }
        });
    });
}

criterion::criterion_group!(
    benches,
    benchmark_annotation,
    benchmark_thumbnail,
    benchmark_archive,
    benchmark_frame_reads,
);
criterion::criterion_main!(benches);
