//! Error types for meterfit
//!
//! This module defines all error types used by the fitting core.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for meterfit operations
pub type Result<T> = std::result::Result<T, FitError>;

/// Main error type for meterfit operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// Persisted record error
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Read history error
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Value is not a valid number (NaN, Inf)
    #[error("Invalid value: {0}")]
    InvalidValue(f64),
}

/// Errors while reading a serialized datapoint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    /// Record could not be parsed
    #[error("Malformed record: {reason}")]
    Malformed { reason: String },

    /// Timestamp is not valid ISO-8601
    #[error("Invalid timestamp '{timestamp}': {reason}")]
    InvalidTimestamp { timestamp: String, reason: String },

    /// Value is not a finite number
    #[error("Non-numeric value: {0}")]
    NonNumericValue(String),
}

impl RecordError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Errors raised by the read history
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistoryError {
    /// Reading does not come strictly after the last accepted one
    #[error("Out of order reading: {attempted} is not after last reading at {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    /// Restored reads break the strictly increasing ordering
    #[error("Unordered history: {later} does not follow {earlier}")]
    Unordered {
        earlier: DateTime<Utc>,
        later: DateTime<Utc>,
    },

    /// Completed reads were restored without a last reading
    #[error("History ends at {latest} but has no last reading")]
    MissingLast { latest: DateTime<Utc> },
}
