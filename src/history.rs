//! Rolling measurement history persisted between check runs.
//!
//! The state file holds at most `interval + 1` measurements, oldest first.
//! It is rewritten on every successful run through a temporary file in the
//! same directory followed by a rename, so readers never see a half-written
//! file. Concurrent invocations against the same path are not supported:
//! the read-modify-write cycle takes no lock.

use crate::error::{AppError, Result};
use crate::measurement::{ChannelSnapshot, Measurement, Metric, Sample, CHANNEL_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_INTERVAL: usize = 10;

const STATE_VERSION: u32 = 1;

/// Past measurements, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryWindow {
    entries: VecDeque<Measurement>,
}

impl HistoryWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.entries.iter()
    }

    /// Append a measurement and evict from the front until at most
    /// `interval + 1` entries remain.
    pub fn append(&mut self, measurement: Measurement, interval: usize) {
        self.entries.push_back(measurement);
        while self.entries.len() > interval.saturating_add(1) {
            self.entries.pop_front();
        }
    }

    /// Per-channel, per-metric mean. `None` when there is no history.
    pub fn average(&self) -> Option<RollingAverage> {
        if self.entries.is_empty() {
            return None;
        }
        let n = self.entries.len() as f64;
        let mut sums = [[0.0_f64; 8]; CHANNEL_COUNT];
        for measurement in &self.entries {
            for (sum, channel) in sums.iter_mut().zip(&measurement.channels) {
                for (acc, metric) in sum.iter_mut().zip(Metric::ALL) {
                    *acc += channel.value(metric);
                }
            }
        }
        let channels = sums.map(|sum| {
            let mut avg = ChannelSnapshot::uniform(0.0);
            for (total, metric) in sum.iter().zip(Metric::ALL) {
                avg.set(metric, Sample::Float(total / n));
            }
            avg
        });
        Some(RollingAverage {
            channels,
            samples: self.entries.len(),
        })
    }
}

impl FromIterator<Measurement> for HistoryWindow {
    fn from_iter<I: IntoIterator<Item = Measurement>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Mean of every metric over a history window.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingAverage {
    pub channels: [ChannelSnapshot; CHANNEL_COUNT],
    /// Number of measurements averaged.
    pub samples: usize,
}

impl RollingAverage {
    pub fn value(&self, channel: usize, metric: Metric) -> f64 {
        self.channels[channel].value(metric)
    }
}

#[derive(Serialize, Deserialize)]
struct StateFile {
    version: u32,
    snapshots: Vec<Measurement>,
}

/// Reads and writes the history window at a fixed path.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted window. A missing file is an empty window; an
    /// unreadable or corrupt file is an error the caller may downgrade.
    pub fn load(&self) -> Result<HistoryWindow> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet; starting empty history");
                return Ok(HistoryWindow::new());
            }
            Err(e) => {
                return Err(AppError::State(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        let state: StateFile = serde_json::from_slice(&raw).map_err(|e| {
            AppError::State(format!("corrupt state file {}: {}", self.path.display(), e))
        })?;
        if state.version != STATE_VERSION {
            return Err(AppError::State(format!(
                "unsupported state file version {} in {}",
                state.version,
                self.path.display()
            )));
        }
        debug!(path = %self.path.display(), entries = state.snapshots.len(), "loaded history");
        Ok(state.snapshots.into_iter().collect())
    }

    /// Replace the persisted window.
    pub fn store(&self, window: &HistoryWindow) -> Result<()> {
        let state = StateFile {
            version: STATE_VERSION,
            snapshots: window.iter().cloned().collect(),
        };
        let payload = serde_json::to_vec(&state)?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.write_error(e))?;
        tmp.write_all(&payload).map_err(|e| self.write_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;

        debug!(path = %self.path.display(), entries = window.len(), "stored history");
        Ok(())
    }

    fn write_error(&self, e: std::io::Error) -> AppError {
        AppError::State(format!("cannot write {}: {}", self.path.display(), e))
    }
}
