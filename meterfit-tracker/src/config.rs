// Meterfit Tracker - Per-meter reading orchestration
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Configuration types for Meterfit Tracker

use std::path::Path;

use meterfit::{algorithm, MAX_PREVIOUS_READS};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Tracker-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum number of meters
    pub max_meters: usize,

    /// Completed readings kept per meter
    pub history_capacity: usize,

    /// Meters created at startup
    pub meters: Vec<MeterConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_meters: 64,
            history_capacity: MAX_PREVIOUS_READS,
            meters: Vec::new(),
        }
    }
}

impl TrackerConfig {
    /// Add a meter declaration
    pub fn with_meter(mut self, meter: MeterConfig) -> Self {
        self.meters.push(meter);
        self
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TrackerError::InvalidConfig(e.to_string()))
    }

    /// Load from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::InvalidConfig(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Check limits and every meter declaration
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(TrackerError::InvalidConfig(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        if self.meters.len() > self.max_meters {
            return Err(TrackerError::MaxMetersReached {
                max: self.max_meters,
            });
        }
        for meter in &self.meters {
            meter.validate()?;
        }
        Ok(())
    }
}

/// Lowercase `raw` and map every character outside `[a-z0-9_]` to `_`
fn slug(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Declaration of one manually read meter
///
/// Immutable once the meter exists; changing unit, class or algorithm means
/// declaring a new meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Display name
    pub name: String,

    /// Unit of measurement
    pub unit: String,

    /// Device class (water, gas, energy, ...)
    #[serde(default)]
    pub device_class: String,

    /// Fit algorithm; unknown or absent falls back to the default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

impl MeterConfig {
    /// Create a meter declaration with the default algorithm
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        device_class: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            device_class: device_class.into(),
            algorithm: None,
        }
    }

    /// Select an algorithm by name
    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = Some(algorithm.into());
        self
    }

    /// Stable identifier derived from name and unit
    ///
    /// Only `[a-z0-9_]` survives; the id doubles as a file name.
    pub fn meter_id(&self) -> String {
        format!("{}_{}", slug(&self.name), slug(&self.unit))
    }

    /// Entity form of the identifier
    pub fn entity_id(&self) -> String {
        format!("sensor.{}", self.meter_id())
    }

    /// Check the declaration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TrackerError::InvalidConfig(
                "meter name must not be empty".to_string(),
            ));
        }
        if self.unit.trim().is_empty() {
            return Err(TrackerError::InvalidConfig(format!(
                "meter '{}' has no unit",
                self.name
            )));
        }
        if let Some(name) = self.algorithm.as_deref() {
            if !algorithm::is_registered(name) {
                log::warn!(
                    "meter '{}' requests unknown algorithm '{}', using '{}'",
                    self.name,
                    name,
                    algorithm::DEFAULT_ALGORITHM
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_config_default() {
        let config = TrackerConfig::default();
        assert_eq!(config.max_meters, 64);
        assert_eq!(config.history_capacity, MAX_PREVIOUS_READS);
        assert!(config.meters.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_meter_id() {
        let config = MeterConfig::new("Main Water", "m3", "water");
        assert_eq!(config.meter_id(), "main_water_m3");
        assert_eq!(config.entity_id(), "sensor.main_water_m3");
    }

    #[test]
    fn test_meter_id_is_file_safe() {
        let config = MeterConfig::new("Hot/Cold", "m3", "water");
        assert_eq!(config.meter_id(), "hot_cold_m3");

        let config = MeterConfig::new(" Garage..\\Gas ", "m³", "gas");
        assert_eq!(config.meter_id(), "garage___gas_m_");
    }

    #[test]
    fn test_meter_config_from_json() {
        let json = r#"{
            "history_capacity": 5,
            "meters": [
                {"name": "Gas", "unit": "m3", "device_class": "gas"},
                {"name": "Power", "unit": "kWh", "device_class": "energy", "algorithm": "Linear"}
            ]
        }"#;
        let config = TrackerConfig::from_json(json).unwrap();
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.max_meters, 64);
        assert_eq!(config.meters.len(), 2);
        assert!(config.meters[0].algorithm.is_none());
        assert_eq!(config.meters[1].algorithm.as_deref(), Some("Linear"));
        assert_eq!(config.meters[1].meter_id(), "power_kwh");
    }

    #[test]
    fn test_invalid_json() {
        let result = TrackerConfig::from_json("{ meters: ");
        assert!(matches!(result, Err(TrackerError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_declarations() {
        let empty_name = MeterConfig::new(" ", "m3", "water");
        assert!(empty_name.validate().is_err());

        let no_unit = MeterConfig::new("Water", "", "water");
        assert!(no_unit.validate().is_err());

        let zero_capacity = TrackerConfig {
            history_capacity: 0,
            ..Default::default()
        };
        assert!(zero_capacity.validate().is_err());

        let too_many = TrackerConfig {
            max_meters: 1,
            ..Default::default()
        }
        .with_meter(MeterConfig::new("A", "m3", "water"))
        .with_meter(MeterConfig::new("B", "m3", "water"));
        assert!(matches!(
            too_many.validate(),
            Err(TrackerError::MaxMetersReached { max: 1 })
        ));
    }

    #[test]
    fn test_unknown_algorithm_is_accepted() {
        let config = MeterConfig::new("Water", "m3", "water").with_algorithm("spline");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meters.json");
        std::fs::write(&path, r#"{"meters": [{"name": "Water", "unit": "m3"}]}"#).unwrap();

        let config = TrackerConfig::load_from_file(&path).unwrap();
        assert_eq!(config.meters[0].device_class, "");

        let missing = TrackerConfig::load_from_file(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(TrackerError::InvalidConfig(_))));
    }
}
