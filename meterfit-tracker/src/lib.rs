// Meterfit Tracker - Per-meter reading orchestration
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Meterfit Tracker - Per-meter reading orchestration
//!
//! This crate turns the `meterfit` fitting core into a set of manually read
//! meters with persisted history and an hourly statistics series.
//!
//! ## Overview
//!
//! Someone reads the water, gas or electricity meter every few days and
//! reports the value. For each accepted reading the tracker:
//!
//! - checks that it is later than the previous one,
//! - backfills the gap with one point per hour,
//! - writes the backfill and the reading to a [`StatisticsSink`],
//! - saves the meter's history to a [`MeterStore`].
//!
//! The current value between readings is extrapolated on demand.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::{TimeZone, Utc};
//! use meterfit_tracker::{MemorySink, MemoryStore, MeterConfig, Tracker, TrackerConfig};
//!
//! let config = TrackerConfig::default()
//!     .with_meter(MeterConfig::new("Main Water", "m3", "water"));
//! let sink = Arc::new(MemorySink::new());
//! let tracker = Tracker::with_config(config, sink.clone(), Arc::new(MemoryStore::new())).unwrap();
//!
//! let monday = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
//! let friday = Utc.with_ymd_and_hms(2024, 3, 8, 8, 0, 0).unwrap();
//! tracker.record_reading("sensor.main_water_m3", 1200.0, Some(monday)).unwrap();
//! let outcome = tracker.record_reading("main_water_m3", 1296.0, Some(friday)).unwrap();
//! assert_eq!(outcome.backfilled.len(), 95);
//!
//! // One m3 per hour since friday morning
//! let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap();
//! let estimate = tracker.current_value_at("main_water_m3", saturday).unwrap();
//! assert_eq!(estimate.map(f64::round), Some(1320.0));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Tracker                                                    │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐                     │
//! │  │  Meter   │ │  Meter   │ │  Meter   │  ...                │
//! │  │  water   │ │   gas    │ │  power   │                     │
//! │  │[History] │ │[History] │ │[History] │                     │
//! │  └────┬─────┘ └────┬─────┘ └────┬─────┘                     │
//! │       │            │            │                           │
//! │       └────────────┼────────────┘                           │
//! │          ┌─────────┴─────────┐                              │
//! │          ▼                   ▼                              │
//! │   ┌──────────────┐    ┌────────────┐                        │
//! │   │StatisticsSink│    │ MeterStore │                        │
//! │   └──────────────┘    └────────────┘                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod meter;
mod registry;
mod sink;
mod store;
mod tracker;

// Public API
pub use config::{MeterConfig, TrackerConfig};
pub use error::{Result, SinkError, StoreError, TrackerError};
pub use meter::{Meter, MeterStatus, RecordOutcome};
pub use registry::{lock as lock_meter, normalize_id, MeterHandle, MeterId, MeterRegistry, ENTITY_PREFIX};
pub use sink::{statistic_id, MemorySink, StatisticMetadata, StatisticRecord, StatisticsSink};
pub use store::{JsonFileStore, MemoryStore, MeterStore, StoredMeter};
pub use tracker::{parse_reading_timestamp, ReadingRequest, Tracker};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
