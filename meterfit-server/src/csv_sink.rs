// Meterfit Server - CSV statistics files
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! File-backed statistics sink.
//!
//! One CSV file per statistic id, `<dir>/<statistic_id>.csv`:
//!
//! ```text
//! start,sum
//! 2024-03-01T08:00:00Z,1042.5
//! 2024-03-01T09:00:00Z,1043.25
//! ```
//!
//! Each write merges the new records into the file by hour bucket and
//! rewrites it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use meterfit_tracker::{
    statistic_id, SinkError, StatisticMetadata, StatisticRecord, StatisticsSink,
};
use serde::{Deserialize, Serialize};

/// One CSV row.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    start: String,
    sum: f64,
}

/// Statistics sink writing CSV files.
#[derive(Debug)]
pub struct CsvStatisticsSink {
    dir: PathBuf,
    /// Serializes read-merge-write cycles.
    guard: Mutex<()>,
}

fn backend(e: csv::Error) -> SinkError {
    SinkError::Backend(e.to_string())
}

impl CsvStatisticsSink {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            guard: Mutex::new(()),
        })
    }

    /// File holding one series.
    pub fn path(&self, statistic_id: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", statistic_id))
    }

    /// Records of one series, oldest first.
    pub fn read_series(&self, statistic_id: &str) -> Result<Vec<StatisticRecord>, SinkError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(read_file(&self.path(statistic_id))?
            .into_iter()
            .map(|(start, sum)| StatisticRecord::new(start, sum))
            .collect())
    }
}

fn read_file(path: &Path) -> Result<BTreeMap<DateTime<Utc>, f64>, SinkError> {
    let mut points = BTreeMap::new();
    if !path.exists() {
        return Ok(points);
    }

    let mut reader = csv::Reader::from_path(path).map_err(backend)?;
    for result in reader.deserialize() {
        let row: CsvRow = result.map_err(backend)?;
        let start = DateTime::parse_from_rfc3339(&row.start)
            .map_err(|e| {
                SinkError::Backend(format!(
                    "bad start '{}' in {}: {}",
                    row.start,
                    path.display(),
                    e
                ))
            })?
            .with_timezone(&Utc);
        points.insert(start, row.sum);
    }
    Ok(points)
}

fn write_file(path: &Path, points: &BTreeMap<DateTime<Utc>, f64>) -> Result<(), SinkError> {
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp).map_err(backend)?;
        for (start, sum) in points {
            writer
                .serialize(CsvRow {
                    start: start.to_rfc3339_opts(SecondsFormat::Secs, true),
                    sum: *sum,
                })
                .map_err(backend)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

impl StatisticsSink for CsvStatisticsSink {
    fn write(
        &self,
        metadata: &StatisticMetadata,
        records: &[StatisticRecord],
    ) -> Result<(), SinkError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.path(&metadata.statistic_id());

        let mut points = read_file(&path)?;
        for record in records {
            points.insert(record.start, record.sum);
        }
        write_file(&path, &points)?;

        tracing::debug!(
            "{}: wrote {} record(s) to {}",
            metadata.display_name(),
            records.len(),
            path.display()
        );
        Ok(())
    }

    fn clear(&self, meter_id: &str, algorithm: &str) -> Result<(), SinkError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(self.path(&statistic_id(meter_id, algorithm))) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
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
    fn test_write_and_merge() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvStatisticsSink::new(dir.path()).unwrap();

        sink.write(
            &metadata(),
            &[
                StatisticRecord::new(at(0), 1.0),
                StatisticRecord::new(at(1), 2.0),
            ],
        )
        .unwrap();
        sink.write(
            &metadata(),
            &[
                StatisticRecord::new(at(1), 2.5),
                StatisticRecord::new(at(2), 3.125),
            ],
        )
        .unwrap();

        let series = sink.read_series("water_m3_statistics_linear").unwrap();
        assert_eq!(
            series,
            vec![
                StatisticRecord::new(at(0), 1.0),
                StatisticRecord::new(at(1), 2.5),
                StatisticRecord::new(at(2), 3.125),
            ]
        );

        let raw = std::fs::read_to_string(sink.path("water_m3_statistics_linear")).unwrap();
        assert!(raw.starts_with("start,sum\n2024-03-01T00:00:00Z,1"));
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvStatisticsSink::new(dir.path()).unwrap();
        sink.write(&metadata(), &[StatisticRecord::new(at(0), 1.0)])
            .unwrap();

        sink.clear("water_m3", "linear").unwrap();
        assert!(!sink.path("water_m3_statistics_linear").exists());
        assert!(sink
            .read_series("water_m3_statistics_linear")
            .unwrap()
            .is_empty());

        // Clearing a missing series is fine
        sink.clear("water_m3", "linear").unwrap();
    }

    #[test]
    fn test_corrupt_file_is_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvStatisticsSink::new(dir.path()).unwrap();
        std::fs::write(
            sink.path("water_m3_statistics_linear"),
            "start,sum\nnot-a-date,1.0\n",
        )
        .unwrap();

        let result = sink.write(&metadata(), &[StatisticRecord::new(at(0), 1.0)]);
        assert!(matches!(result, Err(SinkError::Backend(_))));
    }
}
