//! Pose keypoints and the COCO skeleton layout.

mod keypoint;
mod skeleton;

pub use keypoint::{Keypoint, KeypointIndex, KeypointSet, KeypointSpace};
pub use skeleton::{connections_within, SKELETON_CONNECTIONS};
