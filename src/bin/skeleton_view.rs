//! skeleton_view - draw pose-frame skeletons over a video

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pose_overlay::{load_pose_frames, open_sink, open_source, OverlayConfig, SkeletonPipeline};

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
    /// Pose-frame JSON path.
    #[arg(long)]
    pose: Option<PathBuf>,
    /// Annotated output: a video file, a directory for PNG frames, or `-` to skip.
    #[arg(long)]
    output_video: Option<String>,
    /// Keypoints are normalized to [0, 1] instead of pixels.
    #[arg(long)]
    normalized: bool,
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
    if let Some(path) = args.pose {
        cfg.pose_path = path;
    }
    if let Some(target) = args.output_video {
        cfg.skeleton_video = Some(target);
    }
    if args.normalized {
        cfg.skeleton.keypoint_space = pose_overlay::KeypointSpace::Normalized;
    }
    if let Some(speed) = args.speed_factor {
        cfg.skeleton.sync.speed_factor = speed;
    }
    if let Some(offset) = args.sync_offset {
        cfg.skeleton.sync.offset = offset;
    }
    cfg.validate()?;

    cfg.check_inputs(&cfg.pose_path)?;

    let poses = {
        let _stage = ui.stage("Load poses");
        load_pose_frames(&cfg.pose_path)?
    };
    log::info!(
        "poses: {} skeletons over {} frames",
        poses.item_count(),
        poses.frame_count()
    );

    let mut source = {
        let _stage = ui.stage("Open video");
        open_source(&cfg.video)?
    };
    let mut sink = open_sink(cfg.skeleton_video.as_deref(), &source.info())?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            cancel.store(true, Ordering::SeqCst);
        })
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    }

    let mut pipeline = SkeletonPipeline::new(&cfg, poses)?.with_cancel_flag(cancel);
    let mut progress = ui.frames("Draw skeletons");
    let run = pipeline.run(source.as_mut(), sink.as_mut(), &mut progress);
    {
        let _stage = ui.stage("Finish video");
        sink.finish()?;
    }
    let summary = run?;

    log::info!(
        "skeleton_view finished ({}): {} frames written, {} skeletons drawn, {} empty",
        summary.stop,
        summary.frames_written,
        summary.subjects_rendered,
        summary.records_skipped
    );
    println!("video: {} frames -> {}", sink.frames_written(), sink.describe());
    Ok(())
}
