//! Synthetic source (`stub://`) for tests and dry runs.

use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};

use super::{FrameSource, VideoInfo};
use crate::geometry::Resolution;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FRAMES: u64 = 300;

/// Deterministic gradient frames with known metadata.
///
/// URI form: `stub://WIDTHxHEIGHT@FPS/FRAMES`. Any part may be omitted
/// (`stub://camera`, `stub://320x240`, `stub://320x240@25`).
pub struct SyntheticSource {
    uri: String,
    info: VideoInfo,
    position: u64,
}

impl SyntheticSource {
    pub fn parse(uri: &str) -> Result<Self> {
        let spec = uri
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("not a stub:// uri: {}", uri))?;
        let (dims_rate, frames) = match spec.split_once('/') {
            Some((head, frames)) => (head, Some(frames)),
            None => (spec, None),
        };
        let (dims, fps) = match dims_rate.split_once('@') {
            Some((dims, fps)) => (dims, Some(fps)),
            None => (dims_rate, None),
        };
        let resolution = match dims.split_once('x') {
            Some((w, h)) => Resolution::new(
                w.parse().with_context(|| format!("invalid width in {}", uri))?,
                h.parse().with_context(|| format!("invalid height in {}", uri))?,
            ),
            None => Resolution::new(DEFAULT_WIDTH, DEFAULT_HEIGHT),
        };
        let fps = match fps {
            Some(fps) => fps
                .parse::<f64>()
                .with_context(|| format!("invalid fps in {}", uri))?,
            None => super::DEFAULT_FPS,
        };
        let total_frames = match frames {
            Some(frames) => frames
                .parse()
                .with_context(|| format!("invalid frame count in {}", uri))?,
            None => DEFAULT_FRAMES,
        };
        if resolution.width == 0 || resolution.height == 0 {
            return Err(anyhow!("stub source needs a non-zero resolution: {}", uri));
        }
        Ok(Self {
            uri: uri.to_string(),
            info: VideoInfo {
                resolution,
                fps,
                total_frames,
            },
            position: 0,
        })
    }

    fn render(&self, index: u64) -> RgbImage {
        let shade = (index % 256) as u8;
        RgbImage::from_fn(self.info.resolution.width, self.info.resolution.height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, shade])
        })
    }
}

impl FrameSource for SyntheticSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        self.position = frame.min(self.info.total_frames);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.position >= self.info.total_frames {
            return Ok(None);
        }
        let frame = self.render(self.position);
        self.position += 1;
        Ok(Some(frame))
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn describe(&self) -> String {
        format!("{} (synthetic)", self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_uris() -> Result<()> {
        let full = SyntheticSource::parse("stub://320x240@12.5/40")?;
        assert_eq!(full.info().resolution, Resolution::new(320, 240));
        assert_eq!(full.info().fps, 12.5);
        assert_eq!(full.info().total_frames, 40);

        let bare = SyntheticSource::parse("stub://front")?;
        assert_eq!(bare.info().resolution, Resolution::new(640, 480));
        assert_eq!(bare.info().total_frames, 300);

        assert!(SyntheticSource::parse("stub://0x10").is_err());
        assert!(SyntheticSource::parse("stub://axb").is_err());
        Ok(())
    }

    #[test]
    fn reads_until_frame_count_then_ends() -> Result<()> {
        let mut source = SyntheticSource::parse("stub://8x8@30/3")?;
        assert!(source.next_frame()?.is_some());
        source.seek(2)?;
        assert_eq!(source.position(), 2);
        let last = source.next_frame()?.expect("last frame");
        assert_eq!(last.get_pixel(1, 0), &Rgb([1, 0, 2]));
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.position(), 3);
        Ok(())
    }
}
