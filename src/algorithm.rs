//! Algorithm registry
//!
//! Maps algorithm names to fit strategies. The table is static and shared by
//! every meter; an unknown or missing name resolves to [`DEFAULT_ALGORITHM`].
//!
//! ```rust
//! use meterfit::algorithm::{lookup, Algorithm};
//!
//! assert_eq!(lookup(Some("linear")).name(), "linear");
//! assert_eq!(Algorithm::resolve(Some("bogus")).name(), "linear");
//! ```

use std::fmt;

use chrono::{DateTime, Utc};

use crate::datapoint::Datapoint;
use crate::fitter::{Extrapolate, Interpolate};
use crate::linear::{LinearExtrapolate, LinearInterpolate};

/// Name of the fallback algorithm
pub const DEFAULT_ALGORITHM: &str = "linear";

/// A named pair of interpolation and extrapolation strategies
pub struct FitStrategy {
    name: &'static str,
    interpolate: &'static dyn Interpolate,
    extrapolate: &'static dyn Extrapolate,
}

impl FitStrategy {
    /// Registered name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Interpolation capability
    pub fn interpolator(&self) -> &'static dyn Interpolate {
        self.interpolate
    }

    /// Extrapolation capability
    pub fn extrapolator(&self) -> &'static dyn Extrapolate {
        self.extrapolate
    }
}

impl fmt::Debug for FitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitStrategy")
            .field("name", &self.name)
            .finish()
    }
}

static LINEAR: FitStrategy = FitStrategy {
    name: "linear",
    interpolate: &LinearInterpolate,
    extrapolate: &LinearExtrapolate,
};

/// Registered strategies; the first entry is the default.
static ALGORITHMS: &[&FitStrategy] = &[&LINEAR];

fn find(name: &str) -> Option<&'static FitStrategy> {
    ALGORITHMS
        .iter()
        .copied()
        .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
}

/// Look up a strategy by name, falling back to the default
pub fn lookup(name: Option<&str>) -> &'static FitStrategy {
    name.and_then(find).unwrap_or(&LINEAR)
}

/// Whether `name` is a registered algorithm
pub fn is_registered(name: &str) -> bool {
    find(name).is_some()
}

/// Names of all registered algorithms
pub fn available() -> impl Iterator<Item = &'static str> {
    ALGORITHMS.iter().map(|s| s.name)
}

/// Algorithm selection of one meter, resolved once at configuration time
#[derive(Clone, Copy)]
pub struct Algorithm(&'static FitStrategy);

impl Algorithm {
    /// Resolve a configured name
    pub fn resolve(name: Option<&str>) -> Self {
        Self(lookup(name))
    }

    /// Resolved name (lowercase)
    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// Underlying strategy
    pub fn strategy(&self) -> &'static FitStrategy {
        self.0
    }

    /// Interpolate with this algorithm
    pub fn interpolate(&self, history: &[Datapoint], new_point: &Datapoint) -> Vec<Datapoint> {
        self.0.interpolate.interpolate(history, new_point)
    }

    /// Extrapolate with this algorithm
    pub fn extrapolate(&self, points: &[Datapoint], now: DateTime<Utc>) -> Option<Datapoint> {
        self.0.extrapolate.extrapolate(points, now)
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::resolve(None)
    }
}

impl PartialEq for Algorithm {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for Algorithm {}

impl fmt::Debug for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Algorithm").field(&self.0.name).finish()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name)
    }
}
