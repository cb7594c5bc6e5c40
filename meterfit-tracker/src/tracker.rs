// Meterfit Tracker - Per-meter reading orchestration
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! High-level Tracker API
//!
//! The [`Tracker`] owns the meter registry together with the statistics sink
//! and the state store shared by all meters.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use meterfit_tracker::{MemorySink, MemoryStore, MeterConfig, ReadingRequest, Tracker};
//!
//! let sink = Arc::new(MemorySink::new());
//! let mut tracker = Tracker::new(sink.clone(), Arc::new(MemoryStore::new()));
//! tracker.add_meter(MeterConfig::new("Water", "m3", "water")).unwrap();
//!
//! tracker.ingest(&ReadingRequest::new("sensor.water_m3", 100.0, "2024-03-01 08")).unwrap();
//! tracker.ingest(&ReadingRequest::new("water_m3", 104.0, "2024-03-01 12")).unwrap();
//!
//! // Three backfilled hours plus the two readings
//! assert_eq!(sink.series("water_m3", "linear").len(), 5);
//! ```

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{MeterConfig, TrackerConfig};
use crate::error::{Result, StoreError, TrackerError};
use crate::meter::{Meter, MeterStatus, RecordOutcome};
use crate::registry::{self, MeterHandle, MeterRegistry};
use crate::sink::StatisticsSink;
use crate::store::MeterStore;

/// Reading ingestion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRequest {
    /// Bare meter id or `sensor.<id>`
    pub meter_id: String,
    /// Meter value
    pub value: f64,
    /// `YYYY-MM-DD HH` in UTC; defaults to now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ReadingRequest {
    pub fn new(meter_id: impl Into<String>, value: f64, timestamp: impl Into<String>) -> Self {
        Self {
            meter_id: meter_id.into(),
            value,
            timestamp: Some(timestamp.into()),
        }
    }

    /// Request stamped at the time of ingestion
    pub fn now(meter_id: impl Into<String>, value: f64) -> Self {
        Self {
            meter_id: meter_id.into(),
            value,
            timestamp: None,
        }
    }
}

/// Parse a reading timestamp
///
/// Accepts `YYYY-MM-DD HH` (UTC) and any form understood by
/// [`meterfit::parse_timestamp`].
pub fn parse_reading_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(&format!("{}:00", trimmed), "%Y-%m-%d %H:%M")
    {
        return Ok(naive.and_utc());
    }
    meterfit::parse_timestamp(trimmed).map_err(|_| TrackerError::InvalidTimestamp(raw.to_string()))
}

/// High-level API for manually read meters
pub struct Tracker {
    /// Meter registry
    registry: MeterRegistry,
    /// Destination of hourly statistics
    sink: Arc<dyn StatisticsSink>,
    /// Per-meter state persistence
    store: Arc<dyn MeterStore>,
    /// Tracker configuration
    config: TrackerConfig,
}

impl Tracker {
    /// Create an empty tracker with default configuration
    pub fn new(sink: Arc<dyn StatisticsSink>, store: Arc<dyn MeterStore>) -> Self {
        let config = TrackerConfig::default();
        Self {
            registry: MeterRegistry::new(config.max_meters),
            sink,
            store,
            config,
        }
    }

    /// Create a tracker and restore every configured meter
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or declares the same
    /// meter twice.
    pub fn with_config(
        config: TrackerConfig,
        sink: Arc<dyn StatisticsSink>,
        store: Arc<dyn MeterStore>,
    ) -> Result<Self> {
        config.validate()?;
        let mut tracker = Self {
            registry: MeterRegistry::new(config.max_meters),
            sink,
            store,
            config: TrackerConfig {
                meters: Vec::new(),
                ..config.clone()
            },
        };
        for meter in config.meters {
            tracker.add_meter(meter)?;
        }
        Ok(tracker)
    }

    /// Declare a meter, restoring its persisted state
    ///
    /// Stored state that cannot be read is logged and ignored; the meter
    /// then starts uninitialized.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The declaration is invalid
    /// - A meter with the same id already exists
    /// - The maximum number of meters has been reached
    pub fn add_meter(&mut self, config: MeterConfig) -> Result<String> {
        config.validate()?;
        let meter_id = config.meter_id();
        if self.registry.contains(&meter_id) {
            return Err(TrackerError::MeterAlreadyExists(meter_id));
        }

        let stored = match self.store.load(&meter_id) {
            Ok(stored) => stored,
            Err(StoreError::Malformed { reason, .. }) => {
                log::warn!("{}: ignoring malformed stored state: {}", meter_id, reason);
                None
            }
            Err(e) => {
                log::warn!("{}: could not load stored state: {}", meter_id, e);
                None
            }
        };

        let declared = config.clone();
        let meter = Meter::restore(config, stored.as_ref(), self.config.history_capacity);
        log::info!(
            "{}: meter ready ({}, {})",
            meter_id,
            meter.algorithm(),
            meter.state().as_str()
        );
        self.registry.add(meter)?;
        self.config.meters.push(declared);
        Ok(meter_id)
    }

    /// Remove a meter; its persisted state and statistics are kept
    ///
    /// # Errors
    ///
    /// Returns an error if the meter does not exist.
    pub fn remove_meter(&mut self, id: &str) -> Result<()> {
        let handle = self.registry.remove(id)?;
        let meter_id = registry::lock(&handle).id().to_string();
        self.config.meters.retain(|m| m.meter_id() != meter_id);
        Ok(())
    }

    /// Record a reading, stamped now when `timestamp` is `None`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The meter does not exist
    /// - The reading is not later than the last one
    /// - The value is not finite
    /// - Persisting or writing statistics failed (the reading is kept, see
    ///   [`TrackerError::is_partial_success`])
    pub fn record_reading(
        &self,
        id: &str,
        value: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<RecordOutcome> {
        let handle = self.registry.get(id)?;
        let mut meter = registry::lock(&handle);
        meter.record_reading(
            value,
            timestamp.unwrap_or_else(Utc::now),
            self.sink.as_ref(),
            self.store.as_ref(),
        )
    }

    /// Record a reading from an ingestion request
    pub fn ingest(&self, request: &ReadingRequest) -> Result<RecordOutcome> {
        let timestamp = request
            .timestamp
            .as_deref()
            .map(parse_reading_timestamp)
            .transpose()?;
        self.record_reading(&request.meter_id, request.value, timestamp)
    }

    /// Rebuild a meter's statistics from its raw history
    ///
    /// Returns the number of records written.
    pub fn reset_statistics(&self, id: &str) -> Result<usize> {
        let handle = self.registry.get(id)?;
        let meter = registry::lock(&handle);
        meter.reset_statistics(self.sink.as_ref())
    }

    /// Extrapolated value of a meter right now
    pub fn current_value(&self, id: &str) -> Result<Option<f64>> {
        self.current_value_at(id, Utc::now())
    }

    /// Extrapolated value of a meter at `now`
    pub fn current_value_at(&self, id: &str, now: DateTime<Utc>) -> Result<Option<f64>> {
        let handle = self.registry.get(id)?;
        let meter = registry::lock(&handle);
        Ok(meter.current_value(now))
    }

    /// Status of one meter at `now`
    pub fn status(&self, id: &str, now: DateTime<Utc>) -> Result<MeterStatus> {
        let handle = self.registry.get(id)?;
        let meter = registry::lock(&handle);
        Ok(meter.status(now))
    }

    /// Status of every meter at `now`, ordered by id
    pub fn statuses(&self, now: DateTime<Utc>) -> Vec<MeterStatus> {
        self.registry
            .ids()
            .iter()
            .filter_map(|id| self.status(id, now).ok())
            .collect()
    }

    /// Shared handle to a meter
    pub fn meter(&self, id: &str) -> Result<MeterHandle> {
        self.registry.get(id)
    }

    /// Meter ids, sorted
    pub fn meter_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    /// Get number of meters
    pub fn meter_count(&self) -> usize {
        self.registry.count()
    }

    /// Check if a meter exists
    pub fn has_meter(&self, id: &str) -> bool {
        self.registry.contains(id)
    }

    /// Get a reference to the tracker configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("meters", &self.registry.ids())
            .field("history_capacity", &self.config.history_capacity)
            .finish()
    }
}
