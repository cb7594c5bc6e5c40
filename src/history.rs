//! Bounded read history of one meter
//!
//! The history keeps the most recent completed readings (already backfilled)
//! plus the last reported reading, which is held outside the bounded window
//! until the next reading arrives.
//!
//! Timestamps are strictly increasing across `previous` and `last`.

use chrono::{DateTime, Utc};

use crate::datapoint::Datapoint;
use crate::error::HistoryError;
use crate::MAX_PREVIOUS_READS;

/// Lifecycle state of a meter's history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryState {
    /// No reading ever recorded
    Uninitialized,
    /// At least one reading recorded
    Tracking,
}

impl HistoryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryState::Uninitialized => "uninitialized",
            HistoryState::Tracking => "tracking",
        }
    }
}

/// Ordered, bounded buffer of prior readings
#[derive(Debug, Clone, PartialEq)]
pub struct ReadHistory {
    /// Completed readings, oldest first
    previous: Vec<Datapoint>,
    /// Most recent reading
    last: Option<Datapoint>,
    /// Maximum completed readings to keep
    capacity: usize,
}

impl ReadHistory {
    /// Create an empty history holding up to [`MAX_PREVIOUS_READS`] reads
    pub fn new() -> Self {
        Self::with_capacity(MAX_PREVIOUS_READS)
    }

    /// Create an empty history with a custom capacity (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            previous: Vec::with_capacity(capacity),
            last: None,
            capacity,
        }
    }

    /// Rebuild a history from persisted parts
    ///
    /// Reads beyond `capacity` are dropped oldest first.
    pub fn restore(
        previous: Vec<Datapoint>,
        last: Option<Datapoint>,
        capacity: usize,
    ) -> Result<Self, HistoryError> {
        let mut history = Self::with_capacity(capacity);

        let Some(last) = last else {
            if let Some(orphan) = previous.last() {
                return Err(HistoryError::MissingLast {
                    latest: orphan.timestamp(),
                });
            }
            return Ok(history);
        };

        for pair in previous.windows(2) {
            if pair[1].timestamp() <= pair[0].timestamp() {
                return Err(HistoryError::Unordered {
                    earlier: pair[0].timestamp(),
                    later: pair[1].timestamp(),
                });
            }
        }
        if let Some(newest) = previous.last() {
            if last.timestamp() <= newest.timestamp() {
                return Err(HistoryError::Unordered {
                    earlier: newest.timestamp(),
                    later: last.timestamp(),
                });
            }
        }

        let skip = previous.len().saturating_sub(history.capacity);
        history.previous.extend(previous.into_iter().skip(skip));
        history.last = Some(last);
        Ok(history)
    }

    /// Check that a reading at `timestamp` would be accepted
    pub fn check(&self, timestamp: DateTime<Utc>) -> Result<(), HistoryError> {
        match self.last {
            Some(last) if timestamp <= last.timestamp() => Err(HistoryError::OutOfOrder {
                previous: last.timestamp(),
                attempted: timestamp,
            }),
            _ => Ok(()),
        }
    }

    /// Record a new reading
    ///
    /// The previous last reading moves into the bounded window, evicting the
    /// oldest entry at capacity. Nothing changes on error.
    pub fn record(&mut self, reading: Datapoint) -> Result<(), HistoryError> {
        self.check(reading.timestamp())?;

        if let Some(last) = self.last.take() {
            if self.previous.len() >= self.capacity {
                let _evicted = self.previous.remove(0);
                #[cfg(feature = "logging")]
                log::trace!("evicted read at {}", _evicted.timestamp());
            }
            self.previous.push(last);
        }
        self.last = Some(reading);
        Ok(())
    }

    /// Completed readings, oldest first
    pub fn previous(&self) -> &[Datapoint] {
        &self.previous
    }

    /// Most recent reading
    pub fn last(&self) -> Option<&Datapoint> {
        self.last.as_ref()
    }

    /// Completed readings followed by the last reading
    pub fn points(&self) -> Vec<Datapoint> {
        let mut points = Vec::with_capacity(self.previous.len() + 1);
        points.extend_from_slice(&self.previous);
        points.extend(self.last);
        points
    }

    /// Number of completed readings
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    /// True when no reading was ever recorded
    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    /// Maximum completed readings kept
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current lifecycle state
    pub fn state(&self) -> HistoryState {
        if self.last.is_some() {
            HistoryState::Tracking
        } else {
            HistoryState::Uninitialized
        }
    }
}

impl Default for ReadHistory {
    fn default() -> Self {
        Self::new()
    }
}
