//! overlay - annotate a video with a detection stream
//!
//! This tool:
//! 1. Loads the detection JSON and groups records by stream frame
//! 2. Synchronizes the stream against the video's frame rate and length
//! 3. Draws boxes, labels and skeletons, classifying every person
//! 4. Writes the annotated video and a CSV activity report

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pose_overlay::{load_detections, open_sink, open_source, OverlayConfig, OverlayPipeline};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to a TOML config file.
    #[arg(long, env = "OVERLAY_CONFIG")]
    config: Option<PathBuf>,
    /// Input video path (or stub://WxH@FPS/FRAMES).
    #[arg(long)]
    video: Option<String>,
    /// Detection JSON path.
    #[arg(long)]
    detections: Option<PathBuf>,
    /// CSV report path.
    #[arg(long)]
    output_csv: Option<PathBuf>,
    /// Annotated output: a video file, a directory for PNG frames, or `-` to skip.
    #[arg(long)]
    output_video: Option<String>,
    /// Stream frame rate divided by video frame rate.
    #[arg(long)]
    speed_factor: Option<f64>,
    /// Constant stream frame shift.
    #[arg(long, allow_hyphen_values = true)]
    sync_offset: Option<i64>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut cfg = OverlayConfig::load(args.config.as_deref())?;
    if let Some(video) = args.video {
        cfg.video = video;
    }
    if let Some(path) = args.detections {
        cfg.detections_path = path;
    }
    if let Some(path) = args.output_csv {
        cfg.output_csv = path;
    }
    if let Some(target) = args.output_video {
        cfg.output_video = Some(target);
    }
    if let Some(speed) = args.speed_factor {
        cfg.sync.speed_factor = speed;
    }
    if let Some(offset) = args.sync_offset {
        cfg.sync.offset = offset;
    }
    cfg.validate()?;

    cfg.check_inputs(&cfg.detections_path)?;

    let detections = {
        let _stage = ui.stage("Load detections");
        load_detections(&cfg.detections_path)?
    };
    if let Some((first, last)) = detections.range() {
        log::info!(
            "detections: {} records over stream frames {}..={}",
            detections.item_count(),
            first,
            last
        );
    }

    let mut source = {
        let _stage = ui.stage("Open video");
        open_source(&cfg.video)?
    };
    let mut sink = open_sink(cfg.output_video.as_deref(), &source.info())?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            cancel.store(true, Ordering::SeqCst);
        })
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    }

    let mut pipeline = OverlayPipeline::new(&cfg, detections)?.with_cancel_flag(cancel);
    let mut progress = ui.frames("Annotate frames");
    let run = pipeline.run(source.as_mut(), sink.as_mut(), &mut progress);

    // The video and the report are flushed even when the run stopped early.
    {
        let _stage = ui.stage("Finish video");
        sink.finish()?;
    }
    let events = pipeline.into_events();
    let written = {
        let _stage = ui.stage("Write report");
        events.persist(&cfg.output_csv)?
    };
    let summary = run?;

    log::info!(
        "overlay finished ({}): {} frames written, {} with data, {} subjects, {} records skipped",
        summary.stop,
        summary.frames_written,
        summary.frames_with_data,
        summary.subjects_rendered,
        summary.records_skipped
    );
    match written {
        Some(path) => println!(
            "report: {} ({} events, {} danger)",
            path.display(),
            events.len(),
            events.danger_count()
        ),
        None => println!("report: no events recorded"),
    }
    println!("video: {} frames -> {}", sink.frames_written(), sink.describe());
    Ok(())
}
