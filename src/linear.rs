//! Linear fit strategy
//!
//! Assumes the meter advances at a constant rate between two readings.

use chrono::{DateTime, Utc};

use crate::datapoint::Datapoint;
use crate::fitter::{granularity, seconds_between, Extrapolate, Interpolate, GRANULARITY_SECS};

/// Straight-line fill between the last known point and a new reading
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolate;

impl Interpolate for LinearInterpolate {
    fn interpolate(&self, history: &[Datapoint], new_point: &Datapoint) -> Vec<Datapoint> {
        let Some(prev) = history.last() else {
            return Vec::new();
        };

        // Ordering comes before the division below.
        if new_point.timestamp() <= prev.timestamp() {
            #[cfg(feature = "logging")]
            log::debug!(
                "skipping interpolation: {} is not after {}",
                new_point.timestamp(),
                prev.timestamp()
            );
            return Vec::new();
        }

        let hours =
            seconds_between(prev.timestamp(), new_point.timestamp()) / GRANULARITY_SECS as f64;
        let slope = (new_point.value() - prev.value()) / hours;
        let step = granularity();

        let mut missing = Vec::new();
        let mut timestamp = prev.timestamp() + step;
        let mut value = prev.value() + slope;
        while timestamp < new_point.timestamp() {
            missing.push(Datapoint::new(value, timestamp));
            timestamp += step;
            value += slope;
        }
        missing
    }
}

/// Projection of the most recent trend
///
/// Only the last two points are used.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearExtrapolate;

impl Extrapolate for LinearExtrapolate {
    fn extrapolate(&self, points: &[Datapoint], now: DateTime<Utc>) -> Option<Datapoint> {
        match points {
            [] => None,
            [only] => Some(Datapoint::new(only.value(), now)),
            [.., second_last, last] => {
                let span = seconds_between(second_last.timestamp(), last.timestamp());
                if span == 0.0 {
                    return Some(Datapoint::new(last.value(), now));
                }
                let slope = (last.value() - second_last.value()) / span;
                let elapsed = seconds_between(last.timestamp(), now);
                Some(Datapoint::new(last.value() + slope * elapsed, now))
            }
        }
    }
}
