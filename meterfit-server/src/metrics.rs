// Meterfit Server - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for meter monitoring.
//!
//! This module defines all Prometheus metrics exposed by the server
//! and provides functions to update them from tracker results.

use lazy_static::lazy_static;
use meterfit_tracker::{MeterStatus, TrackerError};
use prometheus::{
    register_counter_vec, register_gauge_vec, CounterVec, Encoder, GaugeVec, TextEncoder,
};

lazy_static! {
    // ============================================================
    // Meter Values
    // ============================================================

    /// Extrapolated current value per meter, refreshed on every scrape.
    pub static ref METER_VALUE: GaugeVec = register_gauge_vec!(
        "meterfit_meter_value",
        "Estimated current meter value",
        &["meter", "unit", "algorithm"]
    ).unwrap();

    // ============================================================
    // Event Counters
    // ============================================================

    /// Accepted readings, including partial successes.
    pub static ref READINGS_TOTAL: CounterVec = register_counter_vec!(
        "meterfit_readings_total",
        "Total readings accepted",
        &["meter"]
    ).unwrap();

    /// Rejected readings (labeled by rejection reason).
    pub static ref REJECTED_READINGS_TOTAL: CounterVec = register_counter_vec!(
        "meterfit_rejected_readings_total",
        "Total readings rejected",
        &["meter", "reason"]
    ).unwrap();

    /// Statistics writes that failed after the reading was kept.
    pub static ref SINK_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "meterfit_sink_failures_total",
        "Total statistics sink failures",
        &["meter"]
    ).unwrap();

    /// State saves that failed after the reading was kept.
    pub static ref STORE_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "meterfit_store_failures_total",
        "Total meter state persistence failures",
        &["meter"]
    ).unwrap();

    /// Statistics rebuilds.
    pub static ref RESETS_TOTAL: CounterVec = register_counter_vec!(
        "meterfit_resets_total",
        "Total statistics resets",
        &["meter"]
    ).unwrap();
}

/// `meter` label for readings addressed to no configured meter
pub const UNKNOWN_METER_LABEL: &str = "unknown";

/// Rejection reason label for an error, `None` when the reading was kept.
pub fn rejection_reason(err: &TrackerError) -> Option<&'static str> {
    match err {
        TrackerError::OutOfOrderReading { .. } => Some("out_of_order"),
        TrackerError::InvalidValue { .. } => Some("invalid_value"),
        TrackerError::InvalidTimestamp(_) => Some("invalid_timestamp"),
        TrackerError::UnknownMeter(_) => Some("unknown_meter"),
        TrackerError::SinkWrite { .. } | TrackerError::Store { .. } => None,
        TrackerError::MeterAlreadyExists(_)
        | TrackerError::MaxMetersReached { .. }
        | TrackerError::InvalidConfig(_) => Some("other"),
    }
}

/// Update the value gauges from meter snapshots.
pub fn update_meter_values(statuses: &[MeterStatus]) {
    for status in statuses {
        if let Some(value) = status.current_value {
            METER_VALUE
                .with_label_values(&[
                    status.meter_id.as_str(),
                    status.unit.as_str(),
                    status.algorithm.as_str(),
                ])
                .set(value);
        }
    }
}

/// Count the result of a reading.
pub fn record_reading_result(meter: &str, result: Result<(), &TrackerError>) {
    let err = match result {
        Ok(()) => {
            READINGS_TOTAL.with_label_values(&[meter]).inc();
            return;
        }
        Err(err) => err,
    };

    // Request ids that match no meter never become label values
    let meter = match err {
        TrackerError::UnknownMeter(_) => UNKNOWN_METER_LABEL,
        _ => meter,
    };

    match rejection_reason(err) {
        Some(reason) => REJECTED_READINGS_TOTAL
            .with_label_values(&[meter, reason])
            .inc(),
        None => {
            READINGS_TOTAL.with_label_values(&[meter]).inc();
            if matches!(err, TrackerError::Store { .. }) {
                STORE_FAILURES_TOTAL.with_label_values(&[meter]).inc();
            } else {
                SINK_FAILURES_TOTAL.with_label_values(&[meter]).inc();
            }
        }
    }
}

/// Increment the reset counter.
pub fn record_reset(meter: &str) {
    RESETS_TOTAL.with_label_values(&[meter]).inc();
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
