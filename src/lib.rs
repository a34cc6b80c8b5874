//! Pose and activity overlay for recorded video.
//!
//! This crate overlays an externally produced detection or pose stream onto the video
//! it was computed from. The stream is indexed by its own frame counter, which may run
//! at a different rate than the video and may be shifted against it.
//!
//! # Module Structure
//!
//! - `schema`: detection and pose-frame JSON decoding, grouped by stream frame
//! - `sync`: maps each video frame read to the stream frame to look up
//! - `geometry`: normalized center boxes to pixel-space corners
//! - `pose`: COCO keypoint layout, sentinels and skeleton connections
//! - `classify`: prioritized rule list (SOS, fall, idle, working)
//! - `history`: bounded per-subject sighting history
//! - `render`: boxes, label banners and skeletons on RGB frames
//! - `report`: event log and CSV report
//! - `video`: frame sources and sinks (`stub://` synthetic, PNG sequences, FFmpeg)
//! - `pipeline`: the frame loop tying the above together
//! - `config`: layered TOML, environment and default settings

pub mod classify;
pub mod config;
pub mod geometry;
pub mod history;
pub mod pipeline;
pub mod pose;
pub mod render;
pub mod report;
pub mod schema;
pub mod sync;
pub mod video;

pub use classify::{ActivityClassifier, ActivityStatus, ClassifierSettings, Rule, Subject};
pub use config::{OverlayConfig, TrainNames};
pub use geometry::{NormBox, PixelBox, Resolution};
pub use history::{WorkerHistory, WorkerHistoryEntry};
pub use pipeline::{
    NoopObserver, OverlayPipeline, RunObserver, RunSummary, SkeletonPipeline, StopReason,
};
pub use pose::{Keypoint, KeypointIndex, KeypointSet, KeypointSpace};
pub use render::{RenderSettings, Renderer};
pub use report::{Event, EventLog};
pub use schema::{load_detections, load_pose_frames, DetectionIndex, DetectionRecord, PoseIndex};
pub use sync::{FrameSynchronizer, SyncMode, SyncParams, SyncStep};
pub use video::{open_sink, open_source, FrameSink, FrameSource, VideoInfo};
