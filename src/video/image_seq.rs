use anyhow::{Context, Result};
use image::RgbImage;
use std::path::PathBuf;

use super::FrameSink;

/// Writes each frame as `frame_NNNNNN.png` into a directory.
pub struct ImageSequenceSink {
    dir: PathBuf,
    written: u64,
}

impl ImageSequenceSink {
    pub fn create(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create frame directory {}", dir.display()))?;
        Ok(Self { dir, written: 0 })
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        frame
            .save(&path)
            .with_context(|| format!("failed to write frame {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::info!(
            "wrote {} frames to {}",
            self.written,
            self.dir.display()
        );
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }

    fn describe(&self) -> String {
        format!("{} (png sequence)", self.dir.display())
    }
}

/// Counts frames and discards them.
#[derive(Debug, Default)]
pub struct NullSink {
    written: u64,
}

impl FrameSink for NullSink {
    fn write_frame(&mut self, _frame: &RgbImage) -> Result<()> {
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }

    fn describe(&self) -> String {
        "discarded".to_string()
    }
}
