//! Video frame sources and sinks.
//!
//! Sources:
//! - `stub://WIDTHxHEIGHT@FPS/FRAMES` synthetic source (tests, dry runs)
//! - Local video files (feature: video-ffmpeg)
//!
//! Sinks:
//! - `-` or no target: frames are discarded
//! - a directory (existing, or a path ending in `/`): numbered PNG frames
//! - a video file path (feature: video-ffmpeg): re-encoded at the source rate and size
//!
//! Frames are decoded to RGB and handed over as `image::RgbImage`.

#[cfg(feature = "video-ffmpeg")]
mod ffmpeg;
mod image_seq;
mod synthetic;

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

use crate::geometry::Resolution;

pub use image_seq::{ImageSequenceSink, NullSink};
pub use synthetic::SyntheticSource;

/// Frame rate assumed when the container does not report one.
pub const DEFAULT_FPS: f64 = 30.0;

/// Container-level metadata of a source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    pub resolution: Resolution,
    pub fps: f64,
    /// Frame count from metadata. May be an estimate, or 0 when unknown.
    pub total_frames: u64,
}

/// Sequential frame reader.
pub trait FrameSource {
    fn info(&self) -> VideoInfo;

    /// Positions the source so the next read returns frame `frame` (0-based).
    fn seek(&mut self, frame: u64) -> Result<()>;

    /// Reads the next frame. `None` once the video has ended.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Index of the frame the next read will return (frames consumed so far).
    fn position(&self) -> u64;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// Sequential frame writer.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flushes buffered output. Called once after the last frame.
    fn finish(&mut self) -> Result<()>;

    fn frames_written(&self) -> u64;

    fn describe(&self) -> String;
}

/// Opens a frame source for a `stub://` URI or a local file path.
pub fn open_source(location: &str) -> Result<Box<dyn FrameSource>> {
    if location.trim().is_empty() {
        return Err(anyhow!("video source path is empty"));
    }
    if location.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::parse(location)?));
    }
    if location.contains("://") {
        return Err(anyhow!(
            "video input only supports local paths (no URL schemes): {}",
            location
        ));
    }
    #[cfg(feature = "video-ffmpeg")]
    {
        Ok(Box::new(ffmpeg::FfmpegSource::open(location)?))
    }
    #[cfg(not(feature = "video-ffmpeg"))]
    {
        Err(anyhow!(
            "decoding {} requires the video-ffmpeg feature",
            location
        ))
    }
}

/// Opens a frame sink for `target`, sized and timed like `info`.
pub fn open_sink(target: Option<&str>, info: &VideoInfo) -> Result<Box<dyn FrameSink>> {
    let target = match target.map(str::trim) {
        None | Some("") | Some("-") => return Ok(Box::new(NullSink::default())),
        Some(target) => target,
    };
    if target.ends_with('/') || Path::new(target).is_dir() {
        return Ok(Box::new(ImageSequenceSink::create(PathBuf::from(target))?));
    }
    #[cfg(feature = "video-ffmpeg")]
    {
        Ok(Box::new(ffmpeg::FfmpegSink::create(target, info)?))
    }
    #[cfg(not(feature = "video-ffmpeg"))]
    {
        let _ = info;
        Err(anyhow!(
            "encoding {} requires the video-ffmpeg feature; pass a directory for PNG frames",
            target
        ))
    }
}

/// True when `location` names something that must exist on disk before a run.
pub fn is_local_path(location: &str) -> bool {
    !location.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_source_opens_without_features() -> Result<()> {
        let source = open_source("stub://64x48@25/10")?;
        let info = source.info();
        assert_eq!(info.resolution, Resolution::new(64, 48));
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.total_frames, 10);
        Ok(())
    }

    #[test]
    fn remote_sources_are_rejected() {
        assert!(open_source("rtsp://camera/1").is_err());
        assert!(open_source("  ").is_err());
    }

    #[test]
    fn dash_target_discards_frames() -> Result<()> {
        let info = VideoInfo {
            resolution: Resolution::new(4, 4),
            fps: DEFAULT_FPS,
            total_frames: 1,
        };
        let mut sink = open_sink(Some("-"), &info)?;
        sink.write_frame(&RgbImage::new(4, 4))?;
        sink.finish()?;
        assert_eq!(sink.frames_written(), 1);
        Ok(())
    }

    #[test]
    fn directory_target_writes_png_sequence() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let info = VideoInfo {
            resolution: Resolution::new(4, 4),
            fps: DEFAULT_FPS,
            total_frames: 2,
        };
        let mut sink = open_sink(dir.path().to_str(), &info)?;
        sink.write_frame(&RgbImage::new(4, 4))?;
        sink.write_frame(&RgbImage::new(4, 4))?;
        sink.finish()?;
        assert!(dir.path().join("frame_000000.png").exists());
        assert!(dir.path().join("frame_000001.png").exists());
        Ok(())
    }
}
