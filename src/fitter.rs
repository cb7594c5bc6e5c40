//! Curve fitting interface
//!
//! A fit strategy has two capabilities:
//!
//! - [`Interpolate`]: synthesize the hourly values missing between the last
//!   known reading and a new one
//! - [`Extrapolate`]: estimate the value at an arbitrary instant after the
//!   last reading
//!
//! Both are pure functions over datapoints. Implementations hold no state and
//! are shared across meters and threads.

use chrono::{DateTime, TimeDelta, Utc};

use crate::datapoint::Datapoint;

/// Spacing of synthesized points, in seconds
pub const GRANULARITY_SECS: i64 = 3600;

/// Spacing of synthesized points
pub fn granularity() -> TimeDelta {
    TimeDelta::seconds(GRANULARITY_SECS)
}

/// Guess the values between old datapoints and a new one
pub trait Interpolate: Send + Sync {
    /// Return the points strictly between the last element of `history` and
    /// `new_point`, oldest first.
    ///
    /// An empty `history` yields no points.
    fn interpolate(&self, history: &[Datapoint], new_point: &Datapoint) -> Vec<Datapoint>;
}

/// Guess the value at `now` from known datapoints
pub trait Extrapolate: Send + Sync {
    /// Return the estimate stamped with `now`, or `None` without any data.
    fn extrapolate(&self, points: &[Datapoint], now: DateTime<Utc>) -> Option<Datapoint>;
}

/// Signed number of seconds from `from` to `to`
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}
