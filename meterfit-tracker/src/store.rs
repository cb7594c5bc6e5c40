// Meterfit Tracker - Per-meter reading orchestration
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Meter state persistence
//!
//! Each meter persists one [`StoredMeter`] blob, re-saved after every
//! accepted reading:
//!
//! ```json
//! {
//!   "last_read_value": 1042.5,
//!   "last_updated": "2024-03-01T10:00:00Z",
//!   "previous_reads": [{"value": 1030.0, "timestamp": "2024-02-27T08:00:00Z"}],
//!   "algorithm": "linear"
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::SecondsFormat;
use meterfit::{Algorithm, Datapoint, DatapointRecord, FitError, ReadHistory};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Persisted state of one meter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeter {
    /// Value of the last reading
    pub last_read_value: Option<f64>,
    /// ISO-8601 timestamp of the last reading
    pub last_updated: Option<String>,
    /// Completed readings, oldest first
    #[serde(default)]
    pub previous_reads: Vec<DatapointRecord>,
    /// Algorithm name
    pub algorithm: String,
}

impl StoredMeter {
    /// Capture a meter's history
    pub fn from_history(history: &ReadHistory, algorithm: Algorithm) -> Self {
        let last = history.last();
        Self {
            last_read_value: last.map(|dp| dp.value()),
            last_updated: last
                .map(|dp| dp.timestamp().to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            previous_reads: history.previous().iter().map(Datapoint::to_record).collect(),
            algorithm: algorithm.name().to_string(),
        }
    }

    /// Rebuild the history, validating every record and the ordering
    pub fn to_history(&self, capacity: usize) -> Result<ReadHistory, FitError> {
        let previous = self
            .previous_reads
            .iter()
            .map(Datapoint::from_record)
            .collect::<Result<Vec<_>, _>>()?;

        let last = match (self.last_read_value, self.last_updated.as_deref()) {
            (Some(value), Some(timestamp)) => {
                Some(Datapoint::new(value, meterfit::parse_timestamp(timestamp)?))
            }
            (None, None) => None,
            (Some(_), None) => {
                return Err(meterfit::RecordError::Malformed {
                    reason: "last_read_value without last_updated".to_string(),
                }
                .into())
            }
            (None, Some(_)) => {
                return Err(meterfit::RecordError::Malformed {
                    reason: "last_updated without last_read_value".to_string(),
                }
                .into())
            }
        };
        if let Some(dp) = last {
            if !dp.value().is_finite() {
                return Err(FitError::InvalidValue(dp.value()));
            }
        }

        Ok(ReadHistory::restore(previous, last, capacity)?)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Load/save of per-meter state
pub trait MeterStore: Send + Sync {
    /// Load a meter's state; `Ok(None)` when nothing was saved yet
    fn load(&self, meter_id: &str) -> Result<Option<StoredMeter>, StoreError>;

    /// Replace a meter's state
    fn save(&self, meter_id: &str, state: &StoredMeter) -> Result<(), StoreError>;
}

fn decode(meter_id: &str, raw: &str) -> Result<StoredMeter, StoreError> {
    StoredMeter::from_json(raw).map_err(|e| StoreError::Malformed {
        meter: meter_id.to_string(),
        reason: e.to_string(),
    })
}

/// In-memory store of raw JSON blobs
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a raw blob, bypassing validation
    pub fn insert_raw(&self, meter_id: impl Into<String>, raw: impl Into<String>) {
        self.lock().insert(meter_id.into(), raw.into());
    }

    /// Raw blob of a meter
    pub fn raw(&self, meter_id: &str) -> Option<String> {
        self.lock().get(meter_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MeterStore for MemoryStore {
    fn load(&self, meter_id: &str) -> Result<Option<StoredMeter>, StoreError> {
        self.raw(meter_id)
            .map(|raw| decode(meter_id, &raw))
            .transpose()
    }

    fn save(&self, meter_id: &str, state: &StoredMeter) -> Result<(), StoreError> {
        let raw = state.to_json()?;
        self.insert_raw(meter_id, raw);
        Ok(())
    }
}

/// One JSON file per meter in a directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Use `dir`, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File of a meter
    pub fn path(&self, meter_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", meter_id))
    }
}

impl MeterStore for JsonFileStore {
    fn load(&self, meter_id: &str) -> Result<Option<StoredMeter>, StoreError> {
        let path = self.path(meter_id);
        match std::fs::read_to_string(&path) {
            Ok(raw) => decode(meter_id, &raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, meter_id: &str, state: &StoredMeter) -> Result<(), StoreError> {
        let path = self.path(meter_id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, state.to_json()?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
