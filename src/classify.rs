//! Rule-based activity classification.
//!
//! A classifier is an ordered list of rules. Each rule pairs a predicate over the
//! subject's current box, keypoints and history with the status it assigns. Rules are
//! evaluated top to bottom; the first match wins and `WORKING` is the fallback. Nothing
//! accumulates across frames beyond what the history entry carries.

use serde::Serialize;
use std::fmt;

use crate::geometry::PixelBox;
use crate::history::WorkerHistoryEntry;
use crate::pose::{KeypointIndex, KeypointSet};

pub const DEFAULT_FALL_ASPECT_RATIO: f64 = 1.4;
pub const DEFAULT_IDLE_MIN_FRAMES: u32 = 30;
pub const DEFAULT_IDLE_MAX_DISPLACEMENT_PX: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ActivityStatus {
    #[serde(rename = "SOS_ALERT")]
    SosAlert,
    #[serde(rename = "FALL_DETECTED")]
    FallDetected,
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "WORKING")]
    Working,
    /// Assigned to trains, which are annotated but never classified.
    #[serde(rename = "REPAIR_OBJECT")]
    RepairObject,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::SosAlert => "SOS_ALERT",
            ActivityStatus::FallDetected => "FALL_DETECTED",
            ActivityStatus::Idle => "IDLE",
            ActivityStatus::Working => "WORKING",
            ActivityStatus::RepairObject => "REPAIR_OBJECT",
        }
    }

    pub fn is_danger(&self) -> bool {
        matches!(self, ActivityStatus::SosAlert | ActivityStatus::FallDetected)
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a rule may look at for one subject in one frame.
///
/// Keypoints must already be in pixel space for the frame being annotated.
#[derive(Clone, Copy, Debug)]
pub struct Subject<'a> {
    pub id: i64,
    pub bbox: PixelBox,
    pub keypoints: Option<&'a KeypointSet>,
    pub history: Option<&'a WorkerHistoryEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IdleSettings {
    pub enabled: bool,
    /// Consecutive near-stationary sightings before a subject counts as idle.
    pub min_frames: u32,
    /// Largest per-sighting center displacement still counted as stationary.
    pub max_displacement_px: f64,
}

impl Default for IdleSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            min_frames: DEFAULT_IDLE_MIN_FRAMES,
            max_displacement_px: DEFAULT_IDLE_MAX_DISPLACEMENT_PX,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierSettings {
    /// A box wider than `fall_aspect_ratio * height` is a fall.
    pub fall_aspect_ratio: f64,
    pub idle: IdleSettings,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            fall_aspect_ratio: DEFAULT_FALL_ASPECT_RATIO,
            idle: IdleSettings::default(),
        }
    }
}

pub type Predicate = fn(&Subject<'_>, &ClassifierSettings) -> bool;

#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub status: ActivityStatus,
    pub predicate: Predicate,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("status", &self.status)
            .finish()
    }
}

pub const HANDS_UP_RULE: Rule = Rule {
    name: "hands_up",
    status: ActivityStatus::SosAlert,
    predicate: hands_up,
};

pub const FALL_RULE: Rule = Rule {
    name: "fall",
    status: ActivityStatus::FallDetected,
    predicate: fallen,
};

pub const IDLE_RULE: Rule = Rule {
    name: "idle",
    status: ActivityStatus::Idle,
    predicate: idle,
};

#[derive(Clone, Debug)]
pub struct ActivityClassifier {
    rules: Vec<Rule>,
    settings: ClassifierSettings,
}

impl ActivityClassifier {
    /// Standard precedence: hands up, then fall, then idle (when enabled).
    pub fn new(settings: ClassifierSettings) -> Self {
        let mut rules = vec![HANDS_UP_RULE, FALL_RULE];
        if settings.idle.enabled {
            rules.push(IDLE_RULE);
        }
        Self { rules, settings }
    }

    /// Appends a rule below the existing ones.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn classify(&self, subject: &Subject<'_>) -> ActivityStatus {
        self.rules
            .iter()
            .find(|rule| (rule.predicate)(subject, &self.settings))
            .map(|rule| rule.status)
            .unwrap_or(ActivityStatus::Working)
    }
}

impl Default for ActivityClassifier {
    fn default() -> Self {
        Self::new(ClassifierSettings::default())
    }
}

/// Both wrists above the shoulder line and the left wrist above the nose.
///
/// Missing or undetected keypoints make the rule not match.
fn hands_up(subject: &Subject<'_>, _settings: &ClassifierSettings) -> bool {
    let Some(kps) = subject.keypoints else {
        return false;
    };
    let lookup = |index| kps.detected(index).map(|kp| kp.y);
    let (Some(nose), Some(l_wrist), Some(r_wrist), Some(l_shoulder), Some(r_shoulder)) = (
        lookup(KeypointIndex::Nose),
        lookup(KeypointIndex::LeftWrist),
        lookup(KeypointIndex::RightWrist),
        lookup(KeypointIndex::LeftShoulder),
        lookup(KeypointIndex::RightShoulder),
    ) else {
        return false;
    };
    let shoulders = (l_shoulder + r_shoulder) / 2.0;
    l_wrist < shoulders && r_wrist < shoulders && l_wrist < nose
}

fn fallen(subject: &Subject<'_>, settings: &ClassifierSettings) -> bool {
    let width = subject.bbox.width() as f64;
    let height = subject.bbox.height() as f64;
    width > height * settings.fall_aspect_ratio
}

fn idle(subject: &Subject<'_>, settings: &ClassifierSettings) -> bool {
    subject
        .history
        .is_some_and(|entry| entry.stationary_sightings >= settings.idle.min_frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Resolution;
    use crate::pose::{Keypoint, KeypointSpace};

    fn standing_box() -> PixelBox {
        PixelBox::new(100, 100, 160, 300)
    }

    fn subject(bbox: PixelBox, keypoints: Option<&KeypointSet>) -> Subject<'_> {
        Subject {
            id: 1,
            bbox,
            keypoints,
            history: None,
        }
    }

    /// Normalized COCO pose with the given nose/shoulder/wrist heights.
    fn pose(nose_y: f64, shoulder_y: f64, wrist_y: f64) -> KeypointSet {
        let mut points = vec![Keypoint::new(0.5, 0.5); KeypointIndex::COUNT];
        points[KeypointIndex::Nose as usize] = Keypoint::new(0.5, nose_y);
        points[KeypointIndex::LeftShoulder as usize] = Keypoint::new(0.45, shoulder_y);
        points[KeypointIndex::RightShoulder as usize] = Keypoint::new(0.55, shoulder_y);
        points[KeypointIndex::LeftWrist as usize] = Keypoint::new(0.4, wrist_y);
        points[KeypointIndex::RightWrist as usize] = Keypoint::new(0.6, wrist_y);
        KeypointSet::new(points)
            .to_pixel_space(KeypointSpace::Normalized, Resolution::new(1280, 720))
    }

    #[test]
    fn wide_box_is_a_fall() {
        let classifier = ActivityClassifier::default();
        let status = classifier.classify(&subject(PixelBox::new(0, 0, 100, 50), None));
        assert_eq!(status, ActivityStatus::FallDetected);
        assert!(status.is_danger());
    }

    #[test]
    fn upright_box_defaults_to_working() {
        let classifier = ActivityClassifier::default();
        assert_eq!(
            classifier.classify(&subject(standing_box(), None)),
            ActivityStatus::Working
        );
        // Exactly at the ratio is not a fall.
        assert_eq!(
            classifier.classify(&subject(PixelBox::new(0, 0, 140, 100), None)),
            ActivityStatus::Working
        );
    }

    #[test]
    fn raised_hands_beat_fall_detection() {
        let classifier = ActivityClassifier::default();
        let kps = pose(0.4, 0.3, 0.2);
        let status = classifier.classify(&subject(PixelBox::new(0, 0, 100, 50), Some(&kps)));
        assert_eq!(status, ActivityStatus::SosAlert);
    }

    #[test]
    fn lowered_hands_do_not_raise_sos() {
        let classifier = ActivityClassifier::default();
        let kps = pose(0.2, 0.3, 0.5);
        assert_eq!(
            classifier.classify(&subject(standing_box(), Some(&kps))),
            ActivityStatus::Working
        );
    }

    #[test]
    fn short_or_undetected_pose_skips_sos_rule() {
        let classifier = ActivityClassifier::default();
        let short = KeypointSet::new(vec![Keypoint::new(200.0, 100.0); 6]);
        assert_eq!(
            classifier.classify(&subject(standing_box(), Some(&short))),
            ActivityStatus::Working
        );

        let mut points = pose(0.4, 0.3, 0.2).points().to_vec();
        points[KeypointIndex::RightWrist as usize] = Keypoint::new(0.0, 0.0);
        let missing_wrist = KeypointSet::new(points);
        assert_eq!(
            classifier.classify(&subject(standing_box(), Some(&missing_wrist))),
            ActivityStatus::Working
        );
    }

    #[test]
    fn idle_rule_only_applies_when_enabled() {
        let entry = WorkerHistoryEntry {
            first_seen_frame: 0,
            last_seen_frame: 40,
            sightings: 41,
            last_center: (130, 200),
            last_displacement: 0.0,
            stationary_sightings: 40,
        };
        let still = Subject {
            id: 1,
            bbox: standing_box(),
            keypoints: None,
            history: Some(&entry),
        };

        assert_eq!(ActivityClassifier::default().classify(&still), ActivityStatus::Working);

        let settings = ClassifierSettings {
            idle: IdleSettings {
                enabled: true,
                ..IdleSettings::default()
            },
            ..ClassifierSettings::default()
        };
        let classifier = ActivityClassifier::new(settings);
        assert_eq!(classifier.rules().len(), 3);
        assert_eq!(classifier.classify(&still), ActivityStatus::Idle);
    }

    #[test]
    fn appended_rules_run_after_builtins() {
        fn always(_: &Subject<'_>, _: &ClassifierSettings) -> bool {
            true
        }
        let classifier = ActivityClassifier::default().with_rule(Rule {
            name: "always_idle",
            status: ActivityStatus::Idle,
            predicate: always,
        });
        assert_eq!(
            classifier.classify(&subject(PixelBox::new(0, 0, 100, 50), None)),
            ActivityStatus::FallDetected
        );
        assert_eq!(
            classifier.classify(&subject(standing_box(), None)),
            ActivityStatus::Idle
        );
    }
}
