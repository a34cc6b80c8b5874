//! FFmpeg-backed video decode and encode.
//!
//! Frames are decoded in-memory and converted to RGB24. Seeking decodes and discards
//! frames up to the requested index so the position is exact for every codec.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;

use super::{FrameSink, FrameSource, VideoInfo, DEFAULT_FPS};
use crate::geometry::Resolution;

/// `AVFormatContext::duration` is expressed in microseconds.
const AV_TIME_BASE: f64 = 1_000_000.0;

pub(crate) struct FfmpegSource {
    path: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    info: VideoInfo,
    position: u64,
    flushed: bool,
}

impl FfmpegSource {
    pub(crate) fn open(path: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open video '{}' with ffmpeg", path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("{} has no video track", path))?;
        let stream_index = input_stream.index();
        let rate = input_stream.avg_frame_rate();
        let reported_frames = input_stream.frames();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let fps = if rate.numerator() > 0 && rate.denominator() > 0 {
            f64::from(rate)
        } else {
            DEFAULT_FPS
        };
        let total_frames = if reported_frames > 0 {
            reported_frames as u64
        } else {
            let seconds = input.duration().max(0) as f64 / AV_TIME_BASE;
            (seconds * fps).floor() as u64
        };
        let info = VideoInfo {
            resolution: Resolution::new(decoder.width(), decoder.height()),
            fps,
            total_frames,
        };
        log::info!(
            "video: opened {} ({}x{}, {:.3} fps, {} frames)",
            path,
            info.resolution.width,
            info.resolution.height,
            info.fps,
            info.total_frames
        );

        Ok(Self {
            path: path.to_string(),
            input,
            stream_index,
            decoder,
            scaler,
            info,
            position: 0,
            flushed: false,
        })
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        for (stream, packet) in self.input.packets() {
            if stream.index() == self.stream_index {
                return Some(packet);
            }
        }
        None
    }

    fn decode_next(&mut self) -> Result<Option<ffmpeg::frame::Video>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }
            if self.flushed {
                return Ok(None);
            }
            match self.next_packet() {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    self.decoder.send_eof().context("flush ffmpeg decoder")?;
                    self.flushed = true;
                }
            }
        }
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        if frame < self.position {
            return Err(anyhow!(
                "cannot seek backwards from frame {} to {}",
                self.position,
                frame
            ));
        }
        while self.position < frame {
            if self.decode_next()?.is_none() {
                log::warn!(
                    "video: seek to frame {} stopped at end of stream ({})",
                    frame,
                    self.position
                );
                break;
            }
            self.position += 1;
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(decoded) = self.decode_next()? else {
            return Ok(None);
        };
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let image = frame_to_image(&rgb_frame)?;
        self.position += 1;
        Ok(Some(image))
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn describe(&self) -> String {
        format!("{} (ffmpeg)", self.path)
    }
}

fn frame_to_image(frame: &ffmpeg::frame::Video) -> Result<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let pixels = if stride == row_bytes {
        data.get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?
            .to_vec()
    } else {
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            let end = start + row_bytes;
            pixels.extend_from_slice(
                data.get(start..end)
                    .context("ffmpeg frame row is out of bounds")?,
            );
        }
        pixels
    };

    RgbImage::from_raw(width, height, pixels).context("ffmpeg frame does not fit an RGB image")
}

pub(crate) struct FfmpegSink {
    path: String,
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::video::Encoder,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    resolution: Resolution,
    written: u64,
    finished: bool,
}

impl FfmpegSink {
    pub(crate) fn create(path: &str, info: &VideoInfo) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let mut output = ffmpeg::format::output(&path)
            .with_context(|| format!("failed to create video '{}' with ffmpeg", path))?;
        let codec_id = output.format().codec(&path, ffmpeg::media::Type::Video);
        let codec = ffmpeg::encoder::find(codec_id)
            .ok_or_else(|| anyhow!("no video encoder available for {}", path))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let fps = if info.fps > 0.0 { info.fps } else { DEFAULT_FPS };
        let frame_rate = ffmpeg::Rational::from(fps);
        let time_base = frame_rate.invert();
        let width = info.resolution.width;
        let height = info.resolution.height;

        let (stream_index, encoder) = {
            let mut stream = output.add_stream(codec).context("add video stream")?;
            let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
                .encoder()
                .video()
                .context("create video encoder")?;
            encoder.set_width(width);
            encoder.set_height(height);
            encoder.set_format(ffmpeg::format::Pixel::YUV420P);
            encoder.set_time_base(time_base);
            encoder.set_frame_rate(Some(frame_rate));
            if global_header {
                encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
            }
            let encoder = encoder.open_as(codec).context("open video encoder")?;
            stream.set_parameters(&encoder);
            stream.set_time_base(time_base);
            (stream.index(), encoder)
        };

        output.write_header().context("write video header")?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| anyhow!("video stream vanished after header write"))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            ffmpeg::format::Pixel::RGB24,
            width,
            height,
            ffmpeg::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "video: writing {} ({}x{}, {:.3} fps)",
            path,
            width,
            height,
            fps
        );

        Ok(Self {
            path: path.to_string(),
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base: time_base,
            stream_time_base,
            resolution: info.resolution,
            written: 0,
            finished: false,
        })
    }

    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("write encoded packet")?;
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.width() != self.resolution.width || frame.height() != self.resolution.height {
            return Err(anyhow!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.resolution.width,
                self.resolution.height
            ));
        }
        let mut rgb = ffmpeg::frame::Video::new(
            ffmpeg::format::Pixel::RGB24,
            frame.width(),
            frame.height(),
        );
        let row_bytes = frame.width() as usize * 3;
        let stride = rgb.stride(0);
        let data = rgb.data_mut(0);
        for (row, chunk) in frame.as_raw().chunks_exact(row_bytes).enumerate() {
            let start = row * stride;
            data.get_mut(start..start + row_bytes)
                .context("ffmpeg frame row is out of bounds")?
                .copy_from_slice(chunk);
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .context("convert frame to YUV")?;
        yuv.set_pts(Some(self.written as i64));
        self.encoder
            .send_frame(&yuv)
            .context("send frame to ffmpeg encoder")?;
        self.drain_packets()?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.encoder.send_eof().context("flush ffmpeg encoder")?;
        self.drain_packets()?;
        self.output.write_trailer().context("write video trailer")?;
        self.finished = true;
        log::info!("video: wrote {} frames to {}", self.written, self.path);
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }

    fn describe(&self) -> String {
        format!("{} (ffmpeg)", self.path)
    }
}
