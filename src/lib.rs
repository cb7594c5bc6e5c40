//! # meterfit - curve fitting for manually read meters
//!
//! Utility meters (water, gas, electricity) only ever increase, but many of
//! them are read by hand at irregular intervals. meterfit turns those sparse
//! readings into something a statistics store can use.
//!
//! ## Key Features
//!
//! - **Interpolation**: hourly values between two readings, for backfilling
//! - **Extrapolation**: an estimate of the value right now
//! - **Bounded history**: the last [`MAX_PREVIOUS_READS`] readings, strictly ordered
//! - **Pluggable algorithms**: named strategies behind a static registry
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use meterfit::{Algorithm, Datapoint, ReadHistory};
//!
//! let at = |h| Utc.with_ymd_and_hms(2023, 10, 1, h, 0, 0).unwrap();
//! let algorithm = Algorithm::resolve(Some("linear"));
//! let mut history = ReadHistory::new();
//!
//! history.record(Datapoint::new(1.0, at(0))).unwrap();
//! history.record(Datapoint::new(2.0, at(1))).unwrap();
//!
//! // Backfill the hours before a new reading
//! let reading = Datapoint::new(5.0, at(4));
//! history.record(reading).unwrap();
//! let missing = algorithm.interpolate(history.previous(), &reading);
//! assert_eq!(missing.len(), 2);
//!
//! // Estimate the current value
//! let now = algorithm.extrapolate(&history.points(), at(6)).unwrap();
//! assert_eq!(now.value(), 7.0);
//! ```
//!
//! ## Modules
//!
//! - [`datapoint`]: value/timestamp pairs and their persisted form
//! - [`fitter`]: the interpolation and extrapolation interfaces
//! - [`linear`]: constant-slope strategy
//! - [`algorithm`]: name to strategy registry
//! - [`history`]: bounded read history

// Modules
pub mod algorithm;
pub mod datapoint;
pub mod error;
pub mod fitter;
pub mod history;
pub mod linear;

// Re-exports for convenient access
pub use algorithm::{lookup, Algorithm, FitStrategy, DEFAULT_ALGORITHM};
pub use datapoint::{parse_timestamp, Datapoint, DatapointRecord};
pub use error::{FitError, HistoryError, RecordError, Result};
pub use fitter::{granularity, Extrapolate, Interpolate, GRANULARITY_SECS};
pub use history::{HistoryState, ReadHistory};
pub use linear::{LinearExtrapolate, LinearInterpolate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Completed readings kept per meter
pub const MAX_PREVIOUS_READS: usize = 10;
