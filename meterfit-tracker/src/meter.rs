// Meterfit Tracker - Per-meter reading orchestration
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Meter controller
//!
//! A [`Meter`] owns one read history and one algorithm selection. It turns
//! each accepted reading into an hourly statistics batch and answers
//! current-value queries by extrapolation.

use chrono::{DateTime, Utc};
use meterfit::{Algorithm, Datapoint, DatapointRecord, FitError, HistoryError, HistoryState, ReadHistory};
use serde::Serialize;

use crate::config::MeterConfig;
use crate::error::{Result, TrackerError};
use crate::sink::{StatisticMetadata, StatisticRecord, StatisticsSink};
use crate::store::{MeterStore, StoredMeter};

/// Result of an accepted reading
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    /// The reading as recorded
    pub reading: Datapoint,
    /// Synthesized hourly points between the previous reading and this one
    pub backfilled: Vec<Datapoint>,
}

/// Snapshot of a meter for status queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterStatus {
    pub meter_id: String,
    pub entity_id: String,
    pub name: String,
    pub unit: String,
    pub device_class: String,
    pub algorithm: String,
    /// `uninitialized` or `tracking`
    pub state: String,
    /// Value of the last reading
    pub last_read: Option<f64>,
    /// Timestamp of the last reading
    pub last_updated: Option<DateTime<Utc>>,
    /// Completed readings, oldest first
    pub previous_reads: Vec<DatapointRecord>,
    /// Extrapolated value at the time of the snapshot
    pub current_value: Option<f64>,
}

/// A manually read meter
pub struct Meter {
    config: MeterConfig,
    meter_id: String,
    algorithm: Algorithm,
    history: ReadHistory,
}

impl Meter {
    /// Create an uninitialized meter
    pub fn new(config: MeterConfig, capacity: usize) -> Self {
        let algorithm = Algorithm::resolve(config.algorithm.as_deref());
        Self {
            meter_id: config.meter_id(),
            config,
            algorithm,
            history: ReadHistory::with_capacity(capacity),
        }
    }

    /// Create a meter from persisted state
    ///
    /// Invalid state is discarded with a warning and the meter starts
    /// uninitialized. The configured algorithm always wins over the stored one.
    pub fn restore(config: MeterConfig, stored: Option<&StoredMeter>, capacity: usize) -> Self {
        let mut meter = Self::new(config, capacity);
        let Some(stored) = stored else {
            return meter;
        };

        match stored.to_history(capacity) {
            Ok(history) => {
                if !stored.algorithm.eq_ignore_ascii_case(meter.algorithm.name()) {
                    log::warn!(
                        "{}: stored algorithm '{}' differs from configured '{}'",
                        meter.meter_id,
                        stored.algorithm,
                        meter.algorithm
                    );
                }
                log::info!(
                    "{}: restored {} reading(s)",
                    meter.meter_id,
                    history.points().len()
                );
                meter.history = history;
            }
            Err(e) => {
                log::warn!(
                    "{}: discarding malformed stored state: {}",
                    meter.meter_id,
                    e
                );
            }
        }
        meter
    }

    /// Meter identifier
    pub fn id(&self) -> &str {
        &self.meter_id
    }

    /// Meter declaration
    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    /// Resolved algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Read history
    pub fn history(&self) -> &ReadHistory {
        &self.history
    }

    /// Lifecycle state
    pub fn state(&self) -> HistoryState {
        self.history.state()
    }

    /// Identity attached to every statistics write
    pub fn metadata(&self) -> StatisticMetadata {
        StatisticMetadata {
            meter_id: self.meter_id.clone(),
            name: self.config.name.clone(),
            unit: self.config.unit.clone(),
            algorithm: self.algorithm.name().to_string(),
        }
    }

    /// Persistable state
    pub fn stored(&self) -> StoredMeter {
        StoredMeter::from_history(&self.history, self.algorithm)
    }

    /// Record a reading
    ///
    /// The reading must be strictly later than the last one; rejected readings
    /// leave the meter untouched. Once accepted, state is saved and the
    /// backfill plus the reading are written to the sink. A store or sink
    /// failure after acceptance is returned as a partial success error.
    pub fn record_reading(
        &mut self,
        value: f64,
        timestamp: DateTime<Utc>,
        sink: &dyn StatisticsSink,
        store: &dyn MeterStore,
    ) -> Result<RecordOutcome> {
        let reading = Datapoint::try_new(value, timestamp).map_err(|e| match e {
            FitError::InvalidValue(value) => TrackerError::InvalidValue {
                meter: self.meter_id.clone(),
                value,
            },
            other => TrackerError::InvalidTimestamp(other.to_string()),
        })?;

        self.history
            .record(reading)
            .map_err(|e| self.out_of_order(e))?;

        let backfilled = self.algorithm.interpolate(self.history.previous(), &reading);
        log::debug!(
            "{}: recorded {} at {}, backfilled {} hour(s)",
            self.meter_id,
            value,
            timestamp,
            backfilled.len()
        );

        let saved = store.save(&self.meter_id, &self.stored());

        let records: Vec<StatisticRecord> = backfilled
            .iter()
            .chain(std::iter::once(&reading))
            .map(StatisticRecord::from)
            .collect();
        let written = sink.write(&self.metadata(), &records);

        if let Err(source) = saved {
            log::warn!("{}: failed to persist state: {}", self.meter_id, source);
            return Err(TrackerError::Store {
                meter: self.meter_id.clone(),
                source,
            });
        }
        if let Err(source) = written {
            log::warn!("{}: statistics write failed: {}", self.meter_id, source);
            return Err(TrackerError::SinkWrite {
                meter: self.meter_id.clone(),
                source,
            });
        }

        Ok(RecordOutcome {
            reading,
            backfilled,
        })
    }

    /// Rebuild the statistics series from the raw history
    ///
    /// Returns the number of records written. Does nothing for a meter that
    /// never saw a reading.
    pub fn reset_statistics(&self, sink: &dyn StatisticsSink) -> Result<usize> {
        if self.history.is_empty() {
            log::debug!("{}: reset skipped, no readings", self.meter_id);
            return Ok(0);
        }

        let sink_error = |source| TrackerError::SinkWrite {
            meter: self.meter_id.clone(),
            source,
        };

        let metadata = self.metadata();
        sink.clear(&self.meter_id, &metadata.algorithm)
            .map_err(sink_error)?;

        let points = self.history.points();
        let mut written = 0;
        for (i, point) in points.iter().enumerate() {
            let mut records: Vec<StatisticRecord> = self
                .algorithm
                .interpolate(&points[..i], point)
                .iter()
                .map(StatisticRecord::from)
                .collect();
            records.push(StatisticRecord::from(point));
            sink.write(&metadata, &records).map_err(sink_error)?;
            written += records.len();
        }

        log::info!(
            "{}: statistics rebuilt from {} reading(s), {} record(s)",
            self.meter_id,
            points.len(),
            written
        );
        Ok(written)
    }

    /// Extrapolated value at `now`, `None` before the first reading
    pub fn current_value(&self, now: DateTime<Utc>) -> Option<f64> {
        self.algorithm
            .extrapolate(&self.history.points(), now)
            .map(|dp| dp.value())
    }

    /// Status snapshot at `now`
    pub fn status(&self, now: DateTime<Utc>) -> MeterStatus {
        let last = self.history.last();
        MeterStatus {
            meter_id: self.meter_id.clone(),
            entity_id: self.config.entity_id(),
            name: self.config.name.clone(),
            unit: self.config.unit.clone(),
            device_class: self.config.device_class.clone(),
            algorithm: self.algorithm.name().to_string(),
            state: self.state().as_str().to_string(),
            last_read: last.map(|dp| dp.value()),
            last_updated: last.map(|dp| dp.timestamp()),
            previous_reads: self
                .history
                .previous()
                .iter()
                .map(Datapoint::to_record)
                .collect(),
            current_value: self.current_value(now),
        }
    }

    fn out_of_order(&self, err: HistoryError) -> TrackerError {
        let (previous, attempted) = match err {
            HistoryError::OutOfOrder {
                previous,
                attempted,
            } => (previous, attempted),
            HistoryError::Unordered { earlier, later } => (earlier, later),
            HistoryError::MissingLast { latest } => (latest, latest),
        };
        TrackerError::OutOfOrderReading {
            meter: self.meter_id.clone(),
            previous,
            attempted,
        }
    }
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meter")
            .field("id", &self.meter_id)
            .field("algorithm", &self.algorithm)
            .field("state", &self.state())
            .field("reads", &self.history.points().len())
            .finish()
    }
}
