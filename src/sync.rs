//! Frame synchronization between a video and a detection stream.
//!
//! The detection stream is indexed by its own frame counter, which may run at a
//! different effective rate than the video (`speed_factor` = stream rate / video rate)
//! and may be shifted (`offset`). For each video frame read in order, the synchronizer
//! yields the stream frame index to look up.
//!
//! Two modes exist:
//! - **Scaled**: the video is long enough to cover the stream. The video is first seeked
//!   to `floor(min_frame / speed_factor)`, then every frame advances a counter and
//!   `target = floor(counter * speed_factor) + offset`.
//! - **Offset**: the video is shorter than the stream implies. The stream is overlaid
//!   from its first frame: `target = min_frame + video_position + offset`.
//!
//! In both modes the mapping is non-decreasing and may repeat. Fractional speed factors
//! skip some stream frames entirely; that aliasing is accepted.

use anyhow::{bail, Result};

/// Inputs to [`FrameSynchronizer::new`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncParams {
    /// Total frames reported by the video container.
    pub total_video_frames: u64,
    /// Smallest frame index present in the stream.
    pub stream_min_frame: i64,
    /// Largest frame index present in the stream.
    pub stream_max_frame: i64,
    /// Stream frame rate divided by video frame rate.
    pub speed_factor: f64,
    /// Constant shift applied to every target.
    pub offset: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    Scaled,
    Offset,
}

/// Result of advancing the synchronizer by one video frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStep {
    /// Look up this stream frame for the video frame just read.
    Target(i64),
    /// The stream has run out; stop reading video.
    Exhausted,
}

#[derive(Clone, Debug)]
pub struct FrameSynchronizer {
    params: SyncParams,
    mode: SyncMode,
    start_video_frame: u64,
    counter: i64,
    exhausted: bool,
}

impl FrameSynchronizer {
    pub fn new(params: SyncParams) -> Result<Self> {
        if !params.speed_factor.is_finite() || params.speed_factor <= 0.0 {
            bail!(
                "speed factor must be a positive finite number, got {}",
                params.speed_factor
            );
        }
        if params.stream_min_frame > params.stream_max_frame {
            bail!(
                "stream frame range is inverted ({} > {})",
                params.stream_min_frame,
                params.stream_max_frame
            );
        }

        let expected_end_frame =
            (params.total_video_frames as f64 * params.speed_factor).floor() as i64;
        // A negative start keeps its counter, so the first reads map to negative targets.
        let (mode, start) = if expected_end_frame < params.stream_min_frame {
            (SyncMode::Offset, 0)
        } else {
            let start = (params.stream_min_frame as f64 / params.speed_factor).floor() as i64;
            (SyncMode::Scaled, start)
        };

        Ok(Self {
            params,
            mode,
            start_video_frame: start.max(0) as u64,
            counter: start - 1,
            exhausted: false,
        })
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn params(&self) -> &SyncParams {
        &self.params
    }

    /// Video frame to seek to before the first read. `None` in offset mode.
    pub fn seek_frame(&self) -> Option<u64> {
        match self.mode {
            SyncMode::Scaled => Some(self.start_video_frame),
            SyncMode::Offset => None,
        }
    }

    /// Advances by one video frame.
    ///
    /// `video_position` is the decoder position after the read, i.e. the number of the
    /// next frame it would return. Only offset mode consults it.
    pub fn advance(&mut self, video_position: u64) -> SyncStep {
        if self.exhausted {
            return SyncStep::Exhausted;
        }
        let target = match self.mode {
            SyncMode::Offset => {
                self.params.stream_min_frame + video_position as i64 + self.params.offset
            }
            SyncMode::Scaled => {
                self.counter += 1;
                (self.counter as f64 * self.params.speed_factor).floor() as i64
                    + self.params.offset
            }
        };
        if target > self.params.stream_max_frame {
            self.exhausted = true;
            return SyncStep::Exhausted;
        }
        SyncStep::Target(target)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(total: u64, min: i64, max: i64, speed: f64, offset: i64) -> SyncParams {
        SyncParams {
            total_video_frames: total,
            stream_min_frame: min,
            stream_max_frame: max,
            speed_factor: speed,
            offset,
        }
    }

    /// Drives the synchronizer the way the pipeline does: seek, then one read per step.
    fn run(sync: &mut FrameSynchronizer, total: u64) -> Vec<i64> {
        let mut position = sync.seek_frame().unwrap_or(0);
        let mut targets = Vec::new();
        while position < total {
            position += 1;
            match sync.advance(position) {
                SyncStep::Target(t) => targets.push(t),
                SyncStep::Exhausted => break,
            }
        }
        targets
    }

    #[test]
    fn scaled_mode_seeks_to_stream_start() -> Result<()> {
        let sync = FrameSynchronizer::new(params(3000, 300, 900, 1.0 / 3.0, 0))?;
        assert_eq!(sync.mode(), SyncMode::Scaled);
        assert_eq!(sync.seek_frame(), Some(900));
        Ok(())
    }

    #[test]
    fn scaled_mode_repeats_targets_for_faster_video() -> Result<()> {
        let mut sync = FrameSynchronizer::new(params(30, 0, 4, 0.5, 0))?;
        let targets = run(&mut sync, 30);
        assert_eq!(targets, vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
        assert!(sync.is_exhausted());
        Ok(())
    }

    #[test]
    fn fractional_speed_factor_skips_stream_frames() -> Result<()> {
        let mut sync = FrameSynchronizer::new(params(100, 0, 10, 1.5, 0))?;
        let targets = run(&mut sync, 100);
        assert_eq!(targets, vec![0, 1, 3, 4, 6, 7, 9, 10]);
        Ok(())
    }

    #[test]
    fn offset_shifts_scaled_targets() -> Result<()> {
        let mut sync = FrameSynchronizer::new(params(10, 0, 100, 1.0, 5))?;
        assert_eq!(run(&mut sync, 4), vec![5, 6, 7, 8]);
        Ok(())
    }

    #[test]
    fn negative_stream_start_maps_from_video_start() -> Result<()> {
        let mut sync = FrameSynchronizer::new(params(30, -4, 3, 1.0, 0))?;
        assert_eq!(sync.mode(), SyncMode::Scaled);
        assert_eq!(sync.seek_frame(), Some(0));
        assert_eq!(run(&mut sync, 30), vec![-4, -3, -2, -1, 0, 1, 2, 3]);

        let mut halved = FrameSynchronizer::new(params(30, -3, 0, 0.5, 0))?;
        assert_eq!(halved.seek_frame(), Some(0));
        assert_eq!(run(&mut halved, 30), vec![-3, -3, -2, -2, -1, -1, 0, 0]);
        Ok(())
    }

    #[test]
    fn short_video_falls_back_to_offset_mode() -> Result<()> {
        // 90 video frames * 1/3 = 30 < stream start 500.
        let mut sync = FrameSynchronizer::new(params(90, 500, 503, 1.0 / 3.0, 0))?;
        assert_eq!(sync.mode(), SyncMode::Offset);
        assert_eq!(sync.seek_frame(), None);
        assert_eq!(run(&mut sync, 90), vec![501, 502, 503]);
        Ok(())
    }

    #[test]
    fn targets_never_decrease_and_stop_after_max() -> Result<()> {
        for &(speed, offset) in &[(0.33333, 0), (1.0, -3), (2.5, 7), (0.1, 2)] {
            let mut sync = FrameSynchronizer::new(params(500, 10, 120, speed, offset))?;
            let targets = run(&mut sync, 500);
            assert!(targets.windows(2).all(|w| w[0] <= w[1]), "{speed} {offset}");
            assert!(targets.iter().all(|&t| t <= 120));
            if sync.is_exhausted() {
                assert_eq!(sync.advance(0), SyncStep::Exhausted);
            }
        }
        Ok(())
    }

    #[test]
    fn rejects_non_positive_speed_factor() {
        assert!(FrameSynchronizer::new(params(10, 0, 5, 0.0, 0)).is_err());
        assert!(FrameSynchronizer::new(params(10, 0, 5, f64::NAN, 0)).is_err());
        assert!(FrameSynchronizer::new(params(10, 5, 0, 1.0, 0)).is_err());
    }
}
