//! Input document loaders.
//!
//! Two JSON shapes are accepted, each through its own explicit schema:
//! - detection streams: a list of `{frame, role, id, bbox, class?, keypoints?}` objects
//! - pose-frame streams: a list whose entries are `{keypoints}`, `{people: [...]}`, or a
//!   bare list of `{keypoints}` objects
//!
//! Decoding fails fast on the first malformed entry and names its position. Nothing is
//! guessed from the shape of the data: the caller picks the schema.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::geometry::NormBox;
use crate::pose::{Keypoint, KeypointSet};

pub const TRAIN_ROLE: &str = "train";
const DEFAULT_ROLE: &str = "worker";

/// Flat keypoint lists longer than this are read as (x, y, confidence) triples.
const FLAT_TRIPLE_MIN_LEN: usize = 50;

/// One detected subject in the stream's own frame timebase.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    pub frame: i64,
    pub role: String,
    pub id: i64,
    /// Finer worker type (`class` or `class_name`), when the detector emits one.
    pub class: Option<String>,
    pub bbox: Option<NormBox>,
    pub keypoints: Option<KeypointSet>,
}

impl DetectionRecord {
    pub fn is_train(&self) -> bool {
        self.role == TRAIN_ROLE
    }

    /// Label used for coloring and reporting: the class when present, else the role.
    pub fn worker_type(&self) -> &str {
        self.class.as_deref().unwrap_or(&self.role)
    }
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    frame: Value,
    role: Option<String>,
    #[serde(default)]
    id: i64,
    class: Option<String>,
    class_name: Option<String>,
    bbox: Option<Vec<f64>>,
    keypoints: Option<Value>,
}

/// Records grouped by frame index, insertion order preserved within a frame.
#[derive(Debug, Clone)]
pub struct FrameIndex<T> {
    frames: BTreeMap<i64, Vec<T>>,
}

pub type DetectionIndex = FrameIndex<DetectionRecord>;
pub type PoseIndex = FrameIndex<KeypointSet>;

impl<T> FrameIndex<T> {
    pub fn new() -> Self {
        Self {
            frames: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, frame: i64, item: T) {
        self.frames.entry(frame).or_default().push(item);
    }

    /// Registers a frame that exists in the stream but carries no items.
    pub fn touch(&mut self, frame: i64) {
        self.frames.entry(frame).or_default();
    }

    pub fn get(&self, frame: i64) -> Option<&[T]> {
        self.frames.get(&frame).map(Vec::as_slice)
    }

    pub fn min_frame(&self) -> Option<i64> {
        self.frames.keys().next().copied()
    }

    pub fn max_frame(&self) -> Option<i64> {
        self.frames.keys().next_back().copied()
    }

    /// `(min, max)` frame indices, `None` when empty.
    pub fn range(&self) -> Option<(i64, i64)> {
        Some((self.min_frame()?, self.max_frame()?))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn item_count(&self) -> usize {
        self.frames.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl<T> Default for FrameIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Loads a detection stream from disk.
pub fn load_detections(path: &Path) -> Result<DetectionIndex> {
    let doc = read_json(path)?;
    parse_detections(doc).with_context(|| format!("invalid detection file {}", path.display()))
}

/// Loads a pose-frame stream from disk.
pub fn load_pose_frames(path: &Path) -> Result<PoseIndex> {
    let doc = read_json(path)?;
    parse_pose_frames(doc).with_context(|| format!("invalid pose file {}", path.display()))
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

pub fn parse_detections(doc: Value) -> Result<DetectionIndex> {
    let Value::Array(entries) = doc else {
        bail!(
            "expected a JSON array of detection objects, found {}",
            kind_of(&doc)
        );
    };
    let mut index = DetectionIndex::new();
    for (position, entry) in entries.into_iter().enumerate() {
        let record =
            decode_detection(entry).with_context(|| format!("detection entry {position}"))?;
        index.push(record.frame, record);
    }
    if index.is_empty() {
        bail!("detection document contains no records");
    }
    Ok(index)
}

fn decode_detection(entry: Value) -> Result<DetectionRecord> {
    let raw: RawDetection = serde_json::from_value(entry)?;
    let frame = frame_number(&raw.frame).context("field `frame`")?;
    let bbox = raw
        .bbox
        .map(|values| decode_bbox(&values))
        .transpose()
        .context("field `bbox`")?;
    let keypoints = raw
        .keypoints
        .as_ref()
        .map(decode_keypoints)
        .transpose()
        .context("field `keypoints`")?;
    if bbox.is_none() && keypoints.is_none() {
        bail!("record has neither `bbox` nor `keypoints`");
    }
    Ok(DetectionRecord {
        frame,
        role: raw.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        id: raw.id,
        class: raw.class.or(raw.class_name),
        bbox,
        keypoints,
    })
}

fn decode_bbox(values: &[f64]) -> Result<NormBox> {
    let [cx, cy, w, h] = values else {
        bail!("expected 4 values (cx, cy, w, h), found {}", values.len());
    };
    if values.iter().any(|v| !v.is_finite()) {
        bail!("bbox values must be finite");
    }
    Ok(NormBox::new(*cx, *cy, *w, *h))
}

/// Accepts integers, floats (truncated) and numeric strings.
fn frame_number(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            let f = n
                .as_f64()
                .ok_or_else(|| anyhow!("frame number {n} out of range"))?;
            Ok(f.trunc() as i64)
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| anyhow!("frame `{s}` is not an integer")),
        other => bail!("expected a frame number, found {}", kind_of(other)),
    }
}

pub fn parse_pose_frames(doc: Value) -> Result<PoseIndex> {
    let Value::Array(entries) = doc else {
        bail!("expected a JSON array of pose frames, found {}", kind_of(&doc));
    };
    let mut index = PoseIndex::new();
    for (position, entry) in entries.iter().enumerate() {
        decode_pose_frame(entry, position as i64, &mut index)
            .with_context(|| format!("pose entry {position}"))?;
    }
    Ok(index)
}

fn decode_pose_frame(entry: &Value, position: i64, index: &mut PoseIndex) -> Result<()> {
    match entry {
        Value::Object(map) => {
            let frame = match map.get("frame") {
                Some(value) => frame_number(value).context("field `frame`")?,
                None => position,
            };
            if let Some(kps) = map.get("keypoints") {
                index.push(frame, decode_keypoints(kps).context("field `keypoints`")?);
            } else if let Some(people) = map.get("people") {
                let Value::Array(people) = people else {
                    bail!("field `people` must be a list, found {}", kind_of(people));
                };
                index.touch(frame);
                for (i, person) in people.iter().enumerate() {
                    let kps = person_keypoints(person).with_context(|| format!("person {i}"))?;
                    index.push(frame, kps);
                }
            } else {
                bail!("object has neither `keypoints` nor `people`");
            }
        }
        Value::Array(people) => {
            index.touch(position);
            for (i, person) in people.iter().enumerate() {
                let kps = person_keypoints(person).with_context(|| format!("person {i}"))?;
                index.push(position, kps);
            }
        }
        other => bail!(
            "expected an object or a list of people, found {}",
            kind_of(other)
        ),
    }
    Ok(())
}

fn person_keypoints(person: &Value) -> Result<KeypointSet> {
    let kps = person
        .get("keypoints")
        .ok_or_else(|| anyhow!("missing field `keypoints`"))?;
    decode_keypoints(kps).context("field `keypoints`")
}

/// Decodes nested `[[x, y(, c)], ...]` or flat `[x, y(, c), ...]` keypoint lists.
pub fn decode_keypoints(value: &Value) -> Result<KeypointSet> {
    let Value::Array(items) = value else {
        bail!("expected a list of keypoints, found {}", kind_of(value));
    };
    match items.first() {
        None => Ok(KeypointSet::default()),
        Some(Value::Array(_)) => {
            let points = items
                .iter()
                .enumerate()
                .map(|(i, item)| nested_point(item).with_context(|| format!("keypoint {i}")))
                .collect::<Result<Vec<_>>>()?;
            Ok(KeypointSet::new(points))
        }
        Some(Value::Number(_)) => {
            let values = items
                .iter()
                .enumerate()
                .map(|(i, item)| number(item).with_context(|| format!("value {i}")))
                .collect::<Result<Vec<_>>>()?;
            flat_points(&values)
        }
        Some(other) => bail!(
            "keypoints must be numbers or [x, y] pairs, found {}",
            kind_of(other)
        ),
    }
}

fn nested_point(item: &Value) -> Result<Keypoint> {
    let Value::Array(coords) = item else {
        bail!("expected [x, y] or [x, y, confidence], found {}", kind_of(item));
    };
    match coords.as_slice() {
        [x, y] => Ok(Keypoint::new(number(x)?, number(y)?)),
        [x, y, c, ..] => Ok(Keypoint::with_confidence(
            number(x)?,
            number(y)?,
            number(c)? as f32,
        )),
        _ => bail!("expected at least 2 coordinates, found {}", coords.len()),
    }
}

fn flat_points(values: &[f64]) -> Result<KeypointSet> {
    let len = values.len();
    let stride = if len > FLAT_TRIPLE_MIN_LEN && len % 3 == 0 {
        3
    } else if len % 2 == 0 {
        2
    } else {
        bail!("flat keypoint list of length {len} is not a list of (x, y) pairs");
    };
    let points = values
        .chunks_exact(stride)
        .map(|chunk| match chunk {
            [x, y, c] => Keypoint::with_confidence(*x, *y, *c as f32),
            [x, y] => Keypoint::new(*x, *y),
            _ => unreachable!("chunks_exact yields stride-sized chunks"),
        })
        .collect();
    Ok(KeypointSet::new(points))
}

fn number(value: &Value) -> Result<f64> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| anyhow!("expected a finite number, found {}", kind_of(value)))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
