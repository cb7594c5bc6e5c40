//! Datapoint type and its persisted record form
//!
//! A [`Datapoint`] is an immutable `(value, timestamp)` pair with the
//! timestamp normalized to UTC. It persists as a [`DatapointRecord`]:
//!
//! ```json
//! {"value": 1.0, "timestamp": "2023-10-01T00:00:00Z"}
//! ```
//!
//! Records written without an offset (`2023-10-01T00:00:00`) are read as UTC.

use chrono::{DateTime, DurationRound, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FitError, RecordError};

/// Accepted layouts for timestamps that carry no offset
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A single meter value at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatapointRecord", into = "DatapointRecord")]
pub struct Datapoint {
    value: f64,
    timestamp: DateTime<Utc>,
}

impl Datapoint {
    /// Create a datapoint, converting the timestamp to UTC
    ///
    /// The value is not checked. A NaN or infinite value serializes as
    /// `null` and will not deserialize again; use [`Datapoint::try_new`]
    /// for untrusted input.
    pub fn new<Tz: TimeZone>(value: f64, timestamp: DateTime<Tz>) -> Self {
        Self {
            value,
            timestamp: timestamp.with_timezone(&Utc),
        }
    }

    /// Create a datapoint, rejecting NaN and infinite values
    pub fn try_new<Tz: TimeZone>(value: f64, timestamp: DateTime<Tz>) -> Result<Self, FitError> {
        if !value.is_finite() {
            return Err(FitError::InvalidValue(value));
        }
        Ok(Self::new(value, timestamp))
    }

    /// The meter value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// The instant of the value (UTC)
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Timestamp floored to the top of its hour
    ///
    /// This is the key statistics are bucketed by.
    pub fn hour_bucket(&self) -> DateTime<Utc> {
        self.timestamp
            .duration_trunc(TimeDelta::hours(1))
            .unwrap_or(self.timestamp)
    }

    /// Convert to the persisted record form
    pub fn to_record(&self) -> DatapointRecord {
        DatapointRecord {
            value: serde_json::Number::from_f64(self.value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }

    /// Rebuild a datapoint from its persisted record
    pub fn from_record(record: &DatapointRecord) -> Result<Self, RecordError> {
        let value = match &record.value {
            serde_json::Value::Number(n) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| RecordError::NonNumericValue(n.to_string()))?,
            other => return Err(RecordError::NonNumericValue(other.to_string())),
        };
        let timestamp = parse_timestamp(&record.timestamp)?;
        Ok(Self { value, timestamp })
    }

    /// Serialize to a JSON record
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_record())
    }

    /// Deserialize from a JSON record
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        let record: DatapointRecord =
            serde_json::from_str(json).map_err(|e| RecordError::malformed(e.to_string()))?;
        Self::from_record(&record)
    }
}

/// Textual form of a [`Datapoint`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatapointRecord {
    /// Decimal value; anything but a finite number is rejected on read
    pub value: serde_json::Value,
    /// ISO-8601 timestamp
    pub timestamp: String,
}

impl From<Datapoint> for DatapointRecord {
    fn from(datapoint: Datapoint) -> Self {
        datapoint.to_record()
    }
}

impl TryFrom<DatapointRecord> for Datapoint {
    type Error = RecordError;

    fn try_from(record: DatapointRecord) -> Result<Self, Self::Error> {
        Datapoint::from_record(&record)
    }
}

/// Parse an ISO-8601 timestamp, treating offset-less input as UTC
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RecordError> {
    let raw = raw.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(rfc_err) => NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| RecordError::InvalidTimestamp {
                timestamp: raw.to_string(),
                reason: rfc_err.to_string(),
            }),
    }
}
