use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use bintally::{
    BinTallyError, Capture, Detector, FfmpegLogLevel, PlaybackSession, ProgressCallback,
    ProgressInfo, SessionOptions, VideoFile, annotate, export,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};

const CLI_AFTER_HELP: &str = "Examples:\n  bintally video bins.mp4 --model best.onnx --interval 2 --archive captures.zip\n  bintally image bin.jpg --model best.onnx --out annotated.jpg\n  bintally probe bins.mp4 --json\n  bintally completions zsh > _bintally";

#[derive(Debug, Parser)]
#[command(
    name = "bintally",
    version,
    about = "Detect full and empty bins in images and videos",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run detection on a still image.
    #[command(
        about = "Detect bins in an image",
        after_help = "Examples:\n  bintally image bin.jpg --model best.onnx --out annotated.jpg --conf 0.5"
    )]
    Image {
        /// Input image (JPEG or PNG).
        input: PathBuf,
        /// ONNX detector weights.
        #[arg(long)]
        model: PathBuf,
        /// Output path for the annotated image.
        #[arg(long)]
        out: PathBuf,
        /// Confidence threshold (0.0 - 1.0).
        #[arg(long, default_value_t = 0.4)]
        conf: f32,
        /// Print detections as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Play a video, sampling frames for detection.
    #[command(
        about = "Detect and tally bins in a video",
        after_help = "Examples:\n  bintally video bins.mp4 --model best.onnx --interval 5 --archive captures.zip\n  bintally video bins.avi --model best.onnx --capture-all --captures-dir thumbs --json"
    )]
    Video {
        /// Input video (MP4 or AVI).
        input: PathBuf,
        /// ONNX detector weights.
        #[arg(long)]
        model: PathBuf,
        /// Seconds between two analysed frames (1 - 60).
        #[arg(long, default_value_t = 1)]
        interval: u32,
        /// Confidence threshold (0.0 - 1.0).
        #[arg(long, default_value_t = 0.4)]
        conf: f32,
        /// Capture every sampled frame, even without detections.
        #[arg(long)]
        capture_all: bool,
        /// Display rate in frames per second (1 - 30), used with --pace.
        #[arg(long, default_value_t = 8)]
        display_fps: u32,
        /// Throttle playback to the display rate.
        #[arg(long)]
        pace: bool,
        /// Write all captures to this zip archive.
        #[arg(long)]
        archive: Option<PathBuf>,
        /// Write each capture as an individual JPEG into this directory.
        #[arg(long)]
        captures_dir: Option<PathBuf>,
        /// Print the session summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print frame rate, frame count, and dimensions of a video.
    #[command(about = "Print video metadata", visible_alias = "info")]
    Probe {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(global: &GlobalOptions) {
    let default_level = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed =
            FfmpegLogLevel::parse(level).ok_or(format!("unsupported --log-level: {level}"))?;
        bintally::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

/// Refuse a `--captures-dir` that cannot take the captures before any
/// frame is decoded. Individual file clashes are checked again once the
/// capture names are known.
fn check_captures_dir(directory: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !directory.exists() {
        return Ok(());
    }
    if !directory.is_dir() {
        return Err(format!("captures path is not a directory: {}", directory.display()).into());
    }
    if overwrite {
        return Ok(());
    }
    for entry in fs::read_dir(directory)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("frame_") && name.ends_with(".jpg") {
            return Err(format!(
                "captures directory already holds captures: {} (use --overwrite to replace)",
                directory.display()
            )
            .into());
        }
    }
    Ok(())
}

#[cfg(feature = "tract")]
fn load_detector(model: &Path) -> Result<Box<dyn Detector>, BinTallyError> {
    Ok(Box::new(bintally::TractDetector::load(model)?))
}

#[cfg(not(feature = "tract"))]
fn load_detector(model: &Path) -> Result<Box<dyn Detector>, BinTallyError> {
    if !model.exists() {
        return Err(BinTallyError::ModelNotFound(model.to_path_buf()));
    }
    Err(BinTallyError::Detector(
        "no detector backend compiled in (build with the `tract` feature)".to_string(),
    ))
}

struct BarProgress {
    bar: ProgressBar,
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.current);
        if let Some(detections) = info.detections_so_far {
            self.bar.set_message(format!("{detections} detection(s)"));
        }
    }
}

fn capture_json(capture: &Capture) -> Value {
    json!({
        "frame_index": capture.frame_index,
        "label": capture.label,
        "timestamp": capture.timestamp,
        "bytes": capture.thumbnail.len(),
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Image {
            input,
            model,
            out,
            conf,
            json,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let mut detector = load_detector(&model)?;
            let options = SessionOptions::new().with_confidence_threshold(conf);
            let image = image::open(&input)?.into_rgb8();

            let report = bintally::detect_image(&mut detector, &image, &options)?;
            report.annotated.save(&out)?;

            if json {
                let detections: Vec<Value> = report
                    .detections
                    .iter()
                    .map(|detection| {
                        json!({
                            "class": detection.class.label(),
                            "confidence": detection.confidence,
                            "box": [
                                detection.bounding_box.x1,
                                detection.bounding_box.y1,
                                detection.bounding_box.x2,
                                detection.bounding_box.y2,
                            ],
                        })
                    })
                    .collect();
                let payload = json!({
                    "label": report.label,
                    "detections": detections,
                    "output": out.display().to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {} detection(s) [{}]",
                    "result:".cyan().bold(),
                    report.detections.len(),
                    report.label
                );
                println!("{} {}", "saved".green().bold(), out.display());
            }
        }
        Commands::Video {
            input,
            model,
            interval,
            conf,
            capture_all,
            display_fps,
            pace,
            archive,
            captures_dir,
            json,
        } => {
            if let Some(path) = &archive {
                ensure_writable_path(path, cli.global.overwrite)?;
            }
            if let Some(directory) = &captures_dir {
                check_captures_dir(directory, cli.global.overwrite)?;
            }

            let detector = load_detector(&model)?;
            let video = VideoFile::open(&input)?;
            let total_frames = video.metadata().frame_count;

            let bar = ProgressBar::new(total_frames);
            let style = ProgressStyle::with_template(
                "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
            )?;
            bar.set_style(style.progress_chars("##-"));

            let options = SessionOptions::new()
                .with_sample_interval(interval)
                .with_confidence_threshold(conf)
                .with_capture_only_on_detection(!capture_all)
                .with_display_fps(display_fps)
                .with_pacing(pace)
                .with_progress(Arc::new(BarProgress { bar: bar.clone() }));

            let mut session = PlaybackSession::new(video, detector, options)?;
            let summary = session.run()?;
            let skip = session.skip();
            bar.finish_with_message("done");

            // Release the decoder and model before writing output.
            let aggregator = session.into_aggregator();

            if let Some(path) = &archive {
                export::write_archive(aggregator.captures(), path)?;
            }

            if let Some(directory) = &captures_dir {
                let paths: Vec<PathBuf> = aggregator
                    .captures()
                    .iter()
                    .map(|capture| directory.join(export::single_download_name(capture)))
                    .collect();
                for path in &paths {
                    ensure_writable_path(path, cli.global.overwrite)?;
                }
                fs::create_dir_all(directory)?;
                for (path, capture) in paths.iter().zip(aggregator.captures()) {
                    fs::write(path, &capture.thumbnail)?;
                }
            }

            if json {
                let recent: Vec<Value> = aggregator
                    .recent_default()
                    .into_iter()
                    .map(capture_json)
                    .collect();
                let payload = json!({
                    "frames_processed": summary.frames_processed,
                    "sampled_frames": summary.sampled_frames,
                    "skipped_frames": summary.skipped_frames,
                    "sample_every_frames": skip,
                    "counts": {
                        "total": summary.counters.total,
                        "empty": summary.counters.empty,
                        "full": summary.counters.full,
                    },
                    "capture_count": summary.capture_count,
                    "recent_captures": recent,
                    "archive": archive.as_ref().map(|path| path.display().to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", "Statistics".bold());
                println!("  Total detections: {}", summary.counters.total);
                println!("  Empty bins:       {}", summary.counters.empty);
                println!("  Full bins:        {}", summary.counters.full);
                println!(
                    "  Frames: {} rendered, {} sampled (every {}), {} skipped",
                    summary.frames_processed,
                    summary.sampled_frames,
                    skip,
                    summary.skipped_frames
                );

                let recent = aggregator.recent_default();
                if recent.is_empty() {
                    println!("{}", "No captures.".yellow());
                } else {
                    println!("{}", "Recent captures".bold());
                    for capture in recent {
                        println!("  {}", capture.caption());
                    }
                }

                if let Some(path) = &archive {
                    println!(
                        "{} {}",
                        "saved".green().bold(),
                        format!("{} capture(s) to {}", summary.capture_count, path.display())
                            .green()
                    );
                }
            }
        }
        Commands::Probe { input, json } => {
            let metadata = VideoFile::probe(&input)?;
            let length =
                annotate::format_timestamp(metadata.frame_count, metadata.frames_per_second);
            if json {
                let payload = json!({
                    "format": metadata.format,
                    "codec": metadata.codec,
                    "width": metadata.width,
                    "height": metadata.height,
                    "frames_per_second": metadata.frames_per_second,
                    "frame_count": metadata.frame_count,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "length": length,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Format: {}", metadata.format);
                println!("Codec: {}", metadata.codec);
                println!("Resolution: {}x{}", metadata.width, metadata.height);
                println!("Frame rate: {:.3} fps", metadata.frames_per_second);
                println!("Frames: {}", metadata.frame_count);
                println!("Length: {length}");
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "bintally", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, check_captures_dir};
    use clap::Parser;

    #[test]
    fn captures_dir_clash_is_caught_up_front() {
        let directory = tempfile::tempdir().expect("Failed to create temp dir");
        assert!(check_captures_dir(&directory.path().join("missing"), false).is_ok());
        assert!(check_captures_dir(directory.path(), false).is_ok());

        std::fs::write(directory.path().join("notes.txt"), b"x").unwrap();
        assert!(check_captures_dir(directory.path(), false).is_ok());

        std::fs::write(directory.path().join("frame_0_full.jpg"), b"x").unwrap();
        assert!(check_captures_dir(directory.path(), false).is_err());
        assert!(check_captures_dir(directory.path(), true).is_ok());

        let file = directory.path().join("notes.txt");
        assert!(check_captures_dir(&file, true).is_err());
    }

    #[test]
    fn parse_video_defaults() {
        let cli = Cli::try_parse_from(["bintally", "video", "bins.mp4", "--model", "best.onnx"])
            .unwrap();
        match cli.command {
            Commands::Video {
                interval,
                conf,
                capture_all,
                display_fps,
                pace,
                archive,
                ..
            } => {
                assert_eq!(interval, 1);
                assert!((conf - 0.4).abs() < f32::EPSILON);
                assert!(!capture_all);
                assert_eq!(display_fps, 8);
                assert!(!pace);
                assert!(archive.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_image_requires_out() {
        let result = Cli::try_parse_from(["bintally", "image", "bin.jpg", "--model", "best.onnx"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bintally", "probe", "bins.mp4", "--verbose", "--log-level", "error",
        ])
        .unwrap();
        assert!(cli.global.verbose);
        assert_eq!(cli.global.log_level.as_deref(), Some("error"));
    }
}
