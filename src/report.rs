//! Event log and CSV report.
//!
//! One event is appended per rendered subject per processed frame. The log is written
//! once, at the end of a run. If the target file cannot be written, the report is
//! retried once under a time-stamped fallback name in the same directory.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::classify::ActivityStatus;

/// Column order of the CSV report.
pub const CSV_COLUMNS: [&str; 6] = ["time_sec", "frame", "id", "role", "status", "is_danger"];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub time_sec: f64,
    pub frame: i64,
    pub id: String,
    pub role: String,
    pub status: ActivityStatus,
    pub is_danger: u8,
}

impl Event {
    pub fn new(frame: i64, fps: f64, id: String, role: String, status: ActivityStatus) -> Self {
        Self {
            time_sec: time_sec(frame, fps),
            frame,
            id,
            role,
            status,
            is_danger: u8::from(status.is_danger()),
        }
    }
}

/// Seconds into the stream, rounded to two decimals.
pub fn time_sec(frame: i64, fps: f64) -> f64 {
    if fps <= 0.0 || !fps.is_finite() {
        return 0.0;
    }
    (frame as f64 / fps * 100.0).round() / 100.0
}

#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn danger_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_danger == 1).count()
    }

    /// Serializes the log as CSV.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(CSV_COLUMNS)?;
        for event in &self.events {
            writer.serialize(event)?;
        }
        writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flush csv buffer: {}", e.error()))
    }

    /// Writes the report to `path`, falling back to `result_<unix>.csv` beside it.
    ///
    /// Returns the path actually written, or `None` when the log is empty.
    pub fn persist(&self, path: &Path) -> Result<Option<PathBuf>> {
        if self.events.is_empty() {
            log::warn!("no events recorded; skipping report {}", path.display());
            return Ok(None);
        }
        let bytes = self.to_csv_bytes()?;
        match std::fs::write(path, &bytes) {
            Ok(()) => Ok(Some(path.to_path_buf())),
            Err(e) => {
                let fallback = fallback_path(path);
                log::warn!(
                    "failed to write report {}: {}; retrying as {}",
                    path.display(),
                    e,
                    fallback.display()
                );
                std::fs::write(&fallback, &bytes)
                    .with_context(|| format!("failed to write report {}", fallback.display()))?;
                Ok(Some(fallback))
            }
        }
    }
}

fn fallback_path(path: &Path) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let name = format!("result_{stamp}.csv");
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && dir.is_dir() => dir.join(name),
        _ => PathBuf::from(name),
    }
}
