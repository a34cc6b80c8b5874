//! Per-subject history across frames.
//!
//! Entries are keyed by subject id, created on first sighting and refreshed on every
//! reappearance. The store is bounded: when full, the least recently seen id is evicted.

use std::collections::HashMap;

use crate::geometry::PixelBox;

pub const DEFAULT_HISTORY_CAPACITY: usize = 512;

#[derive(Clone, Debug, PartialEq)]
pub struct WorkerHistoryEntry {
    pub first_seen_frame: i64,
    pub last_seen_frame: i64,
    pub sightings: u64,
    pub last_center: (i32, i32),
    /// Distance the center moved at the latest sighting.
    pub last_displacement: f64,
    /// Consecutive sightings whose displacement stayed under the stationary threshold.
    pub stationary_sightings: u32,
}

impl WorkerHistoryEntry {
    fn new(frame: i64, center: (i32, i32)) -> Self {
        Self {
            first_seen_frame: frame,
            last_seen_frame: frame,
            sightings: 1,
            last_center: center,
            last_displacement: 0.0,
            stationary_sightings: 0,
        }
    }
}

/// Bounded least-recently-seen store of [`WorkerHistoryEntry`].
#[derive(Debug)]
pub struct WorkerHistory {
    entries: HashMap<i64, (u64, WorkerHistoryEntry)>,
    capacity: usize,
    stationary_threshold_px: f64,
    clock: u64,
}

impl WorkerHistory {
    pub fn new(capacity: usize, stationary_threshold_px: f64) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity: capacity.max(1),
            stationary_threshold_px,
            clock: 0,
        }
    }

    /// Records a sighting of `id` at `frame` and returns its updated entry.
    ///
    /// Repeated sightings within the same stream frame (several video frames mapped to
    /// one stream frame) refresh recency but do not count as movement samples.
    pub fn observe(&mut self, id: i64, frame: i64, bbox: &PixelBox) -> &WorkerHistoryEntry {
        self.clock += 1;
        let center = bbox.center();
        if !self.entries.contains_key(&id) && self.entries.len() >= self.capacity {
            self.evict_least_recent();
        }
        let threshold = self.stationary_threshold_px;
        let slot = self
            .entries
            .entry(id)
            .and_modify(|(_, entry)| {
                if frame != entry.last_seen_frame {
                    let dx = (center.0 - entry.last_center.0) as f64;
                    let dy = (center.1 - entry.last_center.1) as f64;
                    let moved = dx.hypot(dy);
                    entry.last_displacement = moved;
                    if moved <= threshold {
                        entry.stationary_sightings += 1;
                    } else {
                        entry.stationary_sightings = 0;
                    }
                    entry.sightings += 1;
                    entry.last_seen_frame = frame;
                    entry.last_center = center;
                }
            })
            .or_insert_with(|| (0, WorkerHistoryEntry::new(frame, center)));
        slot.0 = self.clock;
        &slot.1
    }

    pub fn get(&self, id: i64) -> Option<&WorkerHistoryEntry> {
        self.entries.get(&id).map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, (seen, _))| *seen)
            .map(|(id, _)| *id);
        if let Some(id) = oldest {
            log::debug!("history: evicting subject {}", id);
            self.entries.remove(&id);
        }
    }
}

impl Default for WorkerHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, 0.0)
    }
}
