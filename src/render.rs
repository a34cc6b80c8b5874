//! Frame annotation: subject boxes, label banners, train markers and skeletons.

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing;
use imageproc::rect::Rect;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::classify::ActivityStatus;
use crate::geometry::PixelBox;
use crate::pose::{connections_within, Keypoint, KeypointSet};

pub const DEFAULT_ROLE_COLOR: [u8; 3] = [0, 255, 0];
pub const DANGER_COLOR: [u8; 3] = [255, 0, 0];
pub const IDLE_COLOR: [u8; 3] = [255, 255, 0];
pub const TRAIN_BOX_COLOR: [u8; 3] = [100, 100, 100];
pub const TRAIN_TEXT_COLOR: [u8; 3] = [255, 255, 255];
pub const LABEL_TEXT_COLOR: [u8; 3] = [0, 0, 0];
pub const KEYPOINT_COLOR: [u8; 3] = [255, 0, 0];
pub const BONE_COLOR: [u8; 3] = [0, 255, 0];

const BOX_THICKNESS: u32 = 2;
const BANNER_WIDTH: u32 = 250;
const BANNER_HEIGHT: u32 = 20;
const KEYPOINT_RADIUS: i32 = 4;
const TRAIN_LABEL_LIFT: i32 = 28;

/// Default RGB color per role.
pub fn default_role_colors() -> BTreeMap<String, [u8; 3]> {
    [
        ("worker", [0, 255, 0]),
        ("janitor", [0, 255, 255]),
        ("manager", [255, 0, 0]),
        ("darkmechanic", [128, 0, 128]),
        ("lightmechanic", [203, 192, 255]),
        ("signalman", [255, 165, 0]),
        ("train", [128, 128, 128]),
    ]
    .into_iter()
    .map(|(role, color)| (role.to_string(), color))
    .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub role_colors: BTreeMap<String, [u8; 3]>,
    /// TrueType/OpenType font for label text. Without one, only banners are drawn.
    pub font_path: Option<PathBuf>,
    pub label_scale: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            role_colors: default_role_colors(),
            font_path: None,
            label_scale: 14.0,
        }
    }
}

/// What a skeleton draw call actually put on the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SkeletonStats {
    pub points: usize,
    pub bones: usize,
}

pub struct Renderer {
    role_colors: BTreeMap<String, [u8; 3]>,
    font: Option<FontVec>,
    label_scale: PxScale,
}

impl Renderer {
    pub fn new(settings: &RenderSettings) -> Result<Self> {
        let font = match &settings.font_path {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("failed to read font {}", path.display()))?;
                let font = FontVec::try_from_vec(bytes)
                    .map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))?;
                Some(font)
            }
            None => None,
        };
        Ok(Self {
            role_colors: settings.role_colors.clone(),
            font,
            label_scale: PxScale::from(settings.label_scale),
        })
    }

    /// Box color for a subject: status overrides first, then the role table.
    pub fn color_for(&self, role: &str, status: ActivityStatus) -> Rgb<u8> {
        let color = match status {
            ActivityStatus::FallDetected | ActivityStatus::SosAlert => DANGER_COLOR,
            ActivityStatus::Idle => IDLE_COLOR,
            ActivityStatus::Working | ActivityStatus::RepairObject => self
                .role_colors
                .get(role)
                .copied()
                .unwrap_or(DEFAULT_ROLE_COLOR),
        };
        Rgb(color)
    }

    /// Outlined box with a filled label banner above it.
    pub fn draw_subject(&self, frame: &mut RgbImage, bbox: &PixelBox, label: &str, color: Rgb<u8>) {
        draw_box(frame, bbox, color);
        let banner =
            Rect::at(bbox.x1, bbox.y1 - BANNER_HEIGHT as i32).of_size(BANNER_WIDTH, BANNER_HEIGHT);
        drawing::draw_filled_rect_mut(frame, banner, color);
        if let Some(font) = &self.font {
            drawing::draw_text_mut(
                frame,
                Rgb(LABEL_TEXT_COLOR),
                bbox.x1 + 2,
                bbox.y1 - BANNER_HEIGHT as i32 + 2,
                self.label_scale,
                font,
                label,
            );
        }
    }

    pub fn draw_train(&self, frame: &mut RgbImage, bbox: &PixelBox, name: &str) {
        draw_box(frame, bbox, Rgb(TRAIN_BOX_COLOR));
        if let Some(font) = &self.font {
            drawing::draw_text_mut(
                frame,
                Rgb(TRAIN_TEXT_COLOR),
                bbox.x1,
                bbox.y1 - TRAIN_LABEL_LIFT,
                PxScale::from(self.label_scale.y * 1.4),
                font,
                name,
            );
        }
    }

    /// Draws detected keypoints and the bones between them.
    ///
    /// `keypoints` must be in pixel space. Sentinel points and points off the frame
    /// produce neither a dot nor a bone; connections with an index beyond the set are
    /// skipped.
    pub fn draw_skeleton(&self, frame: &mut RgbImage, keypoints: &KeypointSet) -> SkeletonStats {
        let mut stats = SkeletonStats::default();
        let points: Vec<Option<(i32, i32)>> = keypoints
            .points()
            .iter()
            .map(|kp| drawable_position(kp, frame))
            .collect();
        for &center in points.iter().flatten() {
            drawing::draw_filled_circle_mut(frame, center, KEYPOINT_RADIUS, Rgb(KEYPOINT_COLOR));
            stats.points += 1;
        }
        for (a, b) in connections_within(points.len()) {
            let (Some((x1, y1)), Some((x2, y2))) = (points[a], points[b]) else {
                continue;
            };
            for shift in 0..BOX_THICKNESS as i32 {
                drawing::draw_line_segment_mut(
                    frame,
                    (x1 as f32, (y1 + shift) as f32),
                    (x2 as f32, (y2 + shift) as f32),
                    Rgb(BONE_COLOR),
                );
            }
            stats.bones += 1;
        }
        stats
    }
}

/// Pixel position of a detected point lying on the frame or within one dot radius of it.
fn drawable_position(kp: &Keypoint, frame: &RgbImage) -> Option<(i32, i32)> {
    if kp.is_sentinel() || !kp.x.is_finite() || !kp.y.is_finite() {
        return None;
    }
    let margin = f64::from(KEYPOINT_RADIUS);
    let max_x = f64::from(frame.width()) + margin;
    let max_y = f64::from(frame.height()) + margin;
    if kp.x < -margin || kp.y < -margin || kp.x > max_x || kp.y > max_y {
        return None;
    }
    Some(kp.to_pixel())
}

/// 2px outline. Zero-area boxes are skipped.
fn draw_box(frame: &mut RgbImage, bbox: &PixelBox, color: Rgb<u8>) {
    for inset in 0..BOX_THICKNESS as i32 {
        let width = bbox.width() - 2 * inset;
        let height = bbox.height() - 2 * inset;
        if width <= 0 || height <= 0 {
            return;
        }
        let rect = Rect::at(bbox.x1 + inset, bbox.y1 + inset).of_size(width as u32, height as u32);
        drawing::draw_hollow_rect_mut(frame, rect, color);
    }
}
