// Meterfit Tracker - Per-meter reading orchestration
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Statistics sink interface
//!
//! The sink receives the hourly series of each meter: backfilled points plus
//! the readings themselves. Records are keyed by
//! `(meter_id, algorithm, hour bucket)`; writing a bucket twice keeps the
//! latest value.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use meterfit::Datapoint;

use crate::error::SinkError;

/// Identity of a statistic series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticMetadata {
    /// Owning meter
    pub meter_id: String,
    /// Meter display name
    pub name: String,
    /// Unit of measurement
    pub unit: String,
    /// Algorithm that produced the series
    pub algorithm: String,
}

impl StatisticMetadata {
    /// Series identifier
    pub fn statistic_id(&self) -> String {
        statistic_id(&self.meter_id, &self.algorithm)
    }

    /// Human readable series name
    pub fn display_name(&self) -> String {
        format!("{} - statistics ({})", self.name, self.algorithm)
    }
}

/// Series identifier for a meter and algorithm
pub fn statistic_id(meter_id: &str, algorithm: &str) -> String {
    format!("{}_statistics_{}", meter_id, algorithm)
}

/// One hourly statistic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticRecord {
    /// Start of the hour bucket
    pub start: DateTime<Utc>,
    /// Cumulative meter value
    pub sum: f64,
}

impl StatisticRecord {
    pub fn new(start: DateTime<Utc>, sum: f64) -> Self {
        Self { start, sum }
    }
}

impl From<&Datapoint> for StatisticRecord {
    fn from(datapoint: &Datapoint) -> Self {
        Self {
            start: datapoint.hour_bucket(),
            sum: datapoint.value(),
        }
    }
}

/// Destination of backfilled statistics
pub trait StatisticsSink: Send + Sync {
    /// Write records, oldest first, overwriting existing buckets
    fn write(&self, metadata: &StatisticMetadata, records: &[StatisticRecord])
        -> Result<(), SinkError>;

    /// Drop every record of the meter's series for `algorithm`
    fn clear(&self, meter_id: &str, algorithm: &str) -> Result<(), SinkError>;
}

#[derive(Debug, Clone)]
struct Series {
    metadata: StatisticMetadata,
    points: BTreeMap<DateTime<Utc>, f64>,
}

/// In-memory sink
///
/// Can be switched offline to simulate a failing backend.
#[derive(Debug)]
pub struct MemorySink {
    series: Mutex<HashMap<(String, String), Series>>,
    available: AtomicBool,
    writes: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            series: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
        }
    }

    /// Accept or reject subsequent writes and clears
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Records of one series, oldest first
    pub fn series(&self, meter_id: &str, algorithm: &str) -> Vec<StatisticRecord> {
        self.lock()
            .get(&(meter_id.to_string(), algorithm.to_string()))
            .map(|s| {
                s.points
                    .iter()
                    .map(|(start, sum)| StatisticRecord::new(*start, *sum))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Metadata of the last write to a series
    pub fn metadata(&self, meter_id: &str, algorithm: &str) -> Option<StatisticMetadata> {
        self.lock()
            .get(&(meter_id.to_string(), algorithm.to_string()))
            .map(|s| s.metadata.clone())
    }

    /// Number of successful write calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// True when no series holds any record
    pub fn is_empty(&self) -> bool {
        self.lock().values().all(|s| s.points.is_empty())
    }

    fn check_available(&self) -> Result<(), SinkError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SinkError::Unavailable("memory sink offline".to_string()))
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Series>> {
        self.series.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsSink for MemorySink {
    fn write(
        &self,
        metadata: &StatisticMetadata,
        records: &[StatisticRecord],
    ) -> Result<(), SinkError> {
        self.check_available()?;

        let mut series = self.lock();
        let entry = series
            .entry((metadata.meter_id.clone(), metadata.algorithm.clone()))
            .or_insert_with(|| Series {
                metadata: metadata.clone(),
                points: BTreeMap::new(),
            });
        entry.metadata = metadata.clone();
        for record in records {
            entry.points.insert(record.start, record.sum);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self, meter_id: &str, algorithm: &str) -> Result<(), SinkError> {
        self.check_available()?;
        self.lock()
            .remove(&(meter_id.to_string(), algorithm.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn at(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + TimeDelta::hours(h)
    }

    fn metadata() -> StatisticMetadata {
        StatisticMetadata {
            meter_id: "water_m3".to_string(),
            name: "Water".to_string(),
            unit: "m3".to_string(),
            algorithm: "linear".to_string(),
        }
    }

    #[test]
    fn test_metadata_names() {
        let meta = metadata();
        assert_eq!(meta.statistic_id(), "water_m3_statistics_linear");
        assert_eq!(meta.display_name(), "Water - statistics (linear)");
    }

    #[test]
    fn test_record_from_datapoint_floors_to_hour() {
        let dp = Datapoint::new(4.5, at(2) + TimeDelta::minutes(45));
        let record = StatisticRecord::from(&dp);
        assert_eq!(record.start, at(2));
        assert_eq!(record.sum, 4.5);
    }

    #[test]
    fn test_write_overwrites_bucket() {
        let sink = MemorySink::new();
        sink.write(
            &metadata(),
            &[StatisticRecord::new(at(0), 1.0), StatisticRecord::new(at(1), 2.0)],
        )
        .unwrap();
        sink.write(&metadata(), &[StatisticRecord::new(at(1), 2.5)])
            .unwrap();

        let series = sink.series("water_m3", "linear");
        assert_eq!(
            series,
            vec![StatisticRecord::new(at(0), 1.0), StatisticRecord::new(at(1), 2.5)]
        );
        assert_eq!(sink.write_count(), 2);
    }

    #[test]
    fn test_clear() {
        let sink = MemorySink::new();
        sink.write(&metadata(), &[StatisticRecord::new(at(0), 1.0)])
            .unwrap();
        sink.clear("water_m3", "linear").unwrap();
        assert!(sink.series("water_m3", "linear").is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_unavailable() {
        let sink = MemorySink::new();
        sink.set_available(false);
        let result = sink.write(&metadata(), &[StatisticRecord::new(at(0), 1.0)]);
        assert!(matches!(result, Err(SinkError::Unavailable(_))));
        assert!(sink.clear("water_m3", "linear").is_err());
        assert_eq!(sink.write_count(), 0);
        assert!(sink.metadata("water_m3", "linear").is_none());
    }
}
