// Meterfit Tracker - Per-meter reading orchestration
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for Meterfit Tracker

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for Tracker operations
#[derive(Error, Debug)]
pub enum TrackerError {
    /// No configured meter matches the identifier
    #[error("Meter not found: {0}")]
    UnknownMeter(String),

    /// Meter already exists
    #[error("Meter already exists: {0}")]
    MeterAlreadyExists(String),

    /// Maximum meters reached
    #[error("Maximum meters ({max}) reached")]
    MaxMetersReached { max: usize },

    /// Reading is not strictly after the last accepted reading
    #[error("Out of order reading for {meter}: {attempted} is not after last reading at {previous}")]
    OutOfOrderReading {
        meter: String,
        previous: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    /// Reading value is NaN or infinite
    #[error("Invalid value for {meter}: {value}")]
    InvalidValue { meter: String, value: f64 },

    /// Reading timestamp could not be parsed
    #[error("Invalid timestamp '{0}': expected YYYY-MM-DD HH")]
    InvalidTimestamp(String),

    /// Statistics write failed after the reading was tracked
    #[error("Statistics write failed for {meter}, reading kept: {source}")]
    SinkWrite {
        meter: String,
        #[source]
        source: SinkError,
    },

    /// Saving meter state failed after the reading was tracked
    #[error("Persisting state failed for {meter}, reading kept: {source}")]
    Store {
        meter: String,
        #[source]
        source: StoreError,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TrackerError {
    /// True when the in-memory state was updated despite the error
    ///
    /// Statistics may be stale; re-run the reset replay once the sink recovers.
    pub fn is_partial_success(&self) -> bool {
        matches!(self, Self::SinkWrite { .. } | Self::Store { .. })
    }
}

/// Errors reported by a statistics sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// Sink cannot accept writes right now
    #[error("Statistics sink unavailable: {0}")]
    Unavailable(String),

    /// Backend rejected the write
    #[error("Statistics backend error: {0}")]
    Backend(String),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a meter store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Stored state could not be decoded
    #[error("Malformed state for {meter}: {reason}")]
    Malformed { meter: String, reason: String },

    /// Encoding failure
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_out_of_order_message_has_context() {
        let err = TrackerError::OutOfOrderReading {
            meter: "water_m3".to_string(),
            previous: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            attempted: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("water_m3"));
        assert!(msg.contains("2024-03-01 09:00:00"));
        assert!(msg.contains("2024-03-01 10:00:00"));
        assert!(!err.is_partial_success());
    }

    #[test]
    fn test_sink_failure_is_partial_success() {
        let err = TrackerError::SinkWrite {
            meter: "water_m3".to_string(),
            source: SinkError::Unavailable("offline".to_string()),
        };
        assert!(err.is_partial_success());
        assert!(err.to_string().contains("reading kept"));
    }
}
