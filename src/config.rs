use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::classify::{
    ClassifierSettings, IdleSettings, DEFAULT_FALL_ASPECT_RATIO, DEFAULT_IDLE_MAX_DISPLACEMENT_PX,
    DEFAULT_IDLE_MIN_FRAMES,
};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::pose::KeypointSpace;
use crate::render::{default_role_colors, RenderSettings};
use crate::video::is_local_path;

const DEFAULT_VIDEO_PATH: &str = "input_video.mov";
const DEFAULT_DETECTIONS_PATH: &str = "final_report.json";
const DEFAULT_POSE_PATH: &str = "pose.json";
const DEFAULT_OUTPUT_CSV: &str = "activity_report.csv";
const DEFAULT_OUTPUT_VIDEO: &str = "result_video.avi";
const DEFAULT_SKELETON_VIDEO: &str = "skeleton_video.mp4";
const DEFAULT_SPEED_FACTOR: f64 = 0.33333;
const DEFAULT_SYNC_OFFSET: i64 = 0;
const DEFAULT_PROGRESS_EVERY: u64 = 50;
const DEFAULT_LABEL_SCALE: f32 = 14.0;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OverlayConfigFile {
    input: Option<InputConfigFile>,
    output: Option<OutputConfigFile>,
    sync: Option<SyncConfigFile>,
    skeleton: Option<SkeletonConfigFile>,
    classifier: Option<ClassifierConfigFile>,
    render: Option<RenderConfigFile>,
    history: Option<HistoryConfigFile>,
    progress: Option<ProgressConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct InputConfigFile {
    video: Option<String>,
    detections: Option<PathBuf>,
    pose: Option<PathBuf>,
    detection_keypoints: Option<KeypointSpace>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputConfigFile {
    csv: Option<PathBuf>,
    video: Option<String>,
    skeleton_video: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SyncConfigFile {
    speed_factor: Option<f64>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SkeletonConfigFile {
    speed_factor: Option<f64>,
    offset: Option<i64>,
    keypoints: Option<KeypointSpace>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ClassifierConfigFile {
    fall_aspect_ratio: Option<f64>,
    idle: Option<IdleConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct IdleConfigFile {
    enabled: Option<bool>,
    min_frames: Option<u32>,
    max_displacement_px: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RenderConfigFile {
    font: Option<PathBuf>,
    label_scale: Option<f32>,
    role_colors: Option<BTreeMap<String, [u8; 3]>>,
    known_trains: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct HistoryConfigFile {
    capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ProgressConfigFile {
    every: Option<u64>,
}

/// Re-timing of a stream against the video.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub speed_factor: f64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonSettings {
    pub sync: SyncSettings,
    pub keypoint_space: KeypointSpace,
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Local video path or `stub://` URI.
    pub video: String,
    pub detections_path: PathBuf,
    pub pose_path: PathBuf,
    /// Coordinate space of keypoints embedded in detection records.
    pub detection_keypoint_space: KeypointSpace,
    pub output_csv: PathBuf,
    /// Annotated video target for `overlay` (`-` disables).
    pub output_video: Option<String>,
    /// Annotated video target for `skeleton_view` (`-` disables).
    pub skeleton_video: Option<String>,
    pub sync: SyncSettings,
    pub skeleton: SkeletonSettings,
    pub classifier: ClassifierSettings,
    pub render: RenderSettings,
    pub known_trains: TrainNames,
    pub history_capacity: usize,
    pub progress_every: u64,
}

impl OverlayConfig {
    /// Defaults, then the config file (`path`, else `OVERLAY_CONFIG`), then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("OVERLAY_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Some(read_config_file(&path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses a TOML config document on top of the defaults. No env overrides.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: OverlayConfigFile =
            toml::from_str(raw).map_err(|e| anyhow!("invalid config: {}", e))?;
        let cfg = Self::from_file(file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OverlayConfigFile) -> Result<Self> {
        let input = file.input.unwrap_or_default();
        let output = file.output.unwrap_or_default();
        let sync = file.sync.unwrap_or_default();
        let skeleton = file.skeleton.unwrap_or_default();
        let classifier = file.classifier.unwrap_or_default();
        let idle = classifier.idle.unwrap_or_default();
        let render = file.render.unwrap_or_default();

        let mut role_colors = default_role_colors();
        role_colors.extend(render.role_colors.unwrap_or_default());

        let known_trains = match render.known_trains {
            Some(map) => TrainNames(parse_known_trains(map)?),
            None => TrainNames::default(),
        };

        Ok(Self {
            video: input
                .video
                .unwrap_or_else(|| DEFAULT_VIDEO_PATH.to_string()),
            detections_path: input
                .detections
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DETECTIONS_PATH)),
            pose_path: input
                .pose
                .unwrap_or_else(|| PathBuf::from(DEFAULT_POSE_PATH)),
            detection_keypoint_space: input
                .detection_keypoints
                .unwrap_or(KeypointSpace::Normalized),
            output_csv: output
                .csv
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_CSV)),
            output_video: Some(
                output
                    .video
                    .unwrap_or_else(|| DEFAULT_OUTPUT_VIDEO.to_string()),
            ),
            skeleton_video: Some(
                output
                    .skeleton_video
                    .unwrap_or_else(|| DEFAULT_SKELETON_VIDEO.to_string()),
            ),
            sync: SyncSettings {
                speed_factor: sync.speed_factor.unwrap_or(DEFAULT_SPEED_FACTOR),
                offset: sync.offset.unwrap_or(DEFAULT_SYNC_OFFSET),
            },
            skeleton: SkeletonSettings {
                sync: SyncSettings {
                    speed_factor: skeleton.speed_factor.unwrap_or(1.0),
                    offset: skeleton.offset.unwrap_or(0),
                },
                keypoint_space: skeleton.keypoints.unwrap_or(KeypointSpace::Pixels),
            },
            classifier: ClassifierSettings {
                fall_aspect_ratio: classifier
                    .fall_aspect_ratio
                    .unwrap_or(DEFAULT_FALL_ASPECT_RATIO),
                idle: IdleSettings {
                    enabled: idle.enabled.unwrap_or(false),
                    min_frames: idle.min_frames.unwrap_or(DEFAULT_IDLE_MIN_FRAMES),
                    max_displacement_px: idle
                        .max_displacement_px
                        .unwrap_or(DEFAULT_IDLE_MAX_DISPLACEMENT_PX),
                },
            },
            render: RenderSettings {
                role_colors,
                font_path: render.font,
                label_scale: render.label_scale.unwrap_or(DEFAULT_LABEL_SCALE),
            },
            known_trains,
            history_capacity: file
                .history
                .and_then(|history| history.capacity)
                .unwrap_or(DEFAULT_HISTORY_CAPACITY),
            progress_every: file
                .progress
                .and_then(|progress| progress.every)
                .unwrap_or(DEFAULT_PROGRESS_EVERY),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(video) = non_empty_env("OVERLAY_VIDEO") {
            self.video = video;
        }
        if let Some(path) = non_empty_env("OVERLAY_DETECTIONS") {
            self.detections_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("OVERLAY_POSE") {
            self.pose_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("OVERLAY_OUTPUT_CSV") {
            self.output_csv = PathBuf::from(path);
        }
        if let Some(target) = non_empty_env("OVERLAY_OUTPUT_VIDEO") {
            self.output_video = Some(target);
        }
        if let Some(speed) = non_empty_env("OVERLAY_SPEED_FACTOR") {
            self.sync.speed_factor = speed
                .trim()
                .parse()
                .map_err(|_| anyhow!("OVERLAY_SPEED_FACTOR must be a number"))?;
        }
        if let Some(offset) = non_empty_env("OVERLAY_SYNC_OFFSET") {
            self.sync.offset = offset
                .trim()
                .parse()
                .map_err(|_| anyhow!("OVERLAY_SYNC_OFFSET must be an integer number of frames"))?;
        }
        Ok(())
    }

    /// Checks invariants. Call again after applying command-line overrides.
    pub fn validate(&self) -> Result<()> {
        validate_speed_factor("sync.speed_factor", self.sync.speed_factor)?;
        validate_speed_factor("skeleton.speed_factor", self.skeleton.sync.speed_factor)?;
        let ratio = self.classifier.fall_aspect_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(anyhow!(
                "classifier.fall_aspect_ratio must be a positive number, got {}",
                ratio
            ));
        }
        if self.classifier.idle.min_frames == 0 {
            return Err(anyhow!("classifier.idle.min_frames must be greater than zero"));
        }
        if self.classifier.idle.max_displacement_px < 0.0 {
            return Err(anyhow!(
                "classifier.idle.max_displacement_px must not be negative"
            ));
        }
        if self.history_capacity == 0 {
            return Err(anyhow!("history.capacity must be greater than zero"));
        }
        if self.progress_every == 0 {
            return Err(anyhow!("progress.every must be greater than zero"));
        }
        if !(self.render.label_scale > 0.0) {
            return Err(anyhow!("render.label_scale must be positive"));
        }
        Ok(())
    }

    /// Fails when the video (a local path) or the `stream` JSON is missing.
    pub fn check_inputs(&self, stream: &Path) -> Result<()> {
        if is_local_path(&self.video) && !Path::new(&self.video).exists() {
            log::error!("video file not found: {}", self.video);
            return Err(anyhow!("video file not found: {}", self.video));
        }
        if !stream.exists() {
            log::error!("input file not found: {}", stream.display());
            return Err(anyhow!("input file not found: {}", stream.display()));
        }
        Ok(())
    }
}

/// Known train ids and their display names.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainNames(BTreeMap<i64, String>);

impl TrainNames {
    /// The configured name, else `TRAIN <id>`.
    pub fn name(&self, id: i64) -> String {
        self.0
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("TRAIN {}", id))
    }
}

impl Default for TrainNames {
    fn default() -> Self {
        Self(BTreeMap::from([
            (82, "No.4521".to_string()),
            (95, "No.77-B".to_string()),
        ]))
    }
}

fn validate_speed_factor(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(anyhow!(
            "{} must be a positive finite number, got {}",
            field,
            value
        ));
    }
    Ok(())
}

fn parse_known_trains(map: BTreeMap<String, String>) -> Result<BTreeMap<i64, String>> {
    map.into_iter()
        .map(|(id, name)| {
            let id = id
                .trim()
                .parse::<i64>()
                .map_err(|_| anyhow!("render.known_trains key `{}` is not an integer id", id))?;
            Ok((id, name))
        })
        .collect()
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<OverlayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
