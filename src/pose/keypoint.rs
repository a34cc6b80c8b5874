use serde::Deserialize;

use crate::geometry::{PixelBox, Resolution};

/// COCO 17-keypoint indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;
}

/// Coordinate space a keypoint stream is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointSpace {
    /// Already in frame pixels.
    #[default]
    Pixels,
    /// Fractions of the frame width/height.
    Normalized,
}

/// Single keypoint. Confidence is carried when the source provides one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub confidence: Option<f32>,
}

impl Keypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            confidence: None,
        }
    }

    pub fn with_confidence(x: f64, y: f64, confidence: f32) -> Self {
        Self {
            x,
            y,
            confidence: Some(confidence),
        }
    }

    /// "Not detected" marker. Only meaningful for pixel-space points.
    pub fn is_sentinel(&self) -> bool {
        self.x <= 1.0 && self.y <= 1.0
    }

    pub fn to_pixel(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

/// Ordered keypoints of one subject. Index meaning follows [`KeypointIndex`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeypointSet {
    points: Vec<Keypoint>,
}

impl KeypointSet {
    pub fn new(points: Vec<Keypoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Keypoint] {
        &self.points
    }

    pub fn get(&self, index: KeypointIndex) -> Option<&Keypoint> {
        self.points.get(index as usize)
    }

    /// Keypoint at `index` unless it is absent or a sentinel.
    pub fn detected(&self, index: KeypointIndex) -> Option<&Keypoint> {
        self.get(index).filter(|kp| !kp.is_sentinel())
    }

    /// Converts into pixel space for a frame of the given resolution.
    pub fn to_pixel_space(&self, space: KeypointSpace, res: Resolution) -> KeypointSet {
        match space {
            KeypointSpace::Pixels => self.clone(),
            KeypointSpace::Normalized => {
                let w = res.width as f64;
                let h = res.height as f64;
                KeypointSet {
                    points: self
                        .points
                        .iter()
                        .map(|kp| Keypoint {
                            x: kp.x * w,
                            y: kp.y * h,
                            confidence: kp.confidence,
                        })
                        .collect(),
                }
            }
        }
    }

    /// Box around the detected points of a pixel-space set.
    pub fn bounding_box(&self) -> Option<PixelBox> {
        PixelBox::enclosing(
            self.points
                .iter()
                .filter(|kp| !kp.is_sentinel())
                .map(|kp| (kp.x, kp.y)),
        )
    }
}
