// Meterfit Tracker - Per-meter reading orchestration
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Meter registry
//!
//! Maps meter identifiers to meters. Each meter sits behind its own mutex so
//! readings on one meter serialize while other meters proceed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, TrackerError};
use crate::meter::Meter;

/// Unique identifier for a meter
pub type MeterId = String;

/// Shared handle to one meter
pub type MeterHandle = Arc<Mutex<Meter>>;

/// Entity prefix accepted in front of meter ids
pub const ENTITY_PREFIX: &str = "sensor.";

/// Lock a meter, recovering from a poisoned lock
pub fn lock(handle: &Mutex<Meter>) -> MutexGuard<'_, Meter> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Strip the entity prefix from an identifier
pub fn normalize_id(id: &str) -> &str {
    let id = id.trim();
    id.strip_prefix(ENTITY_PREFIX).unwrap_or(id)
}

/// Manages the set of meters
pub struct MeterRegistry {
    /// Map of meter ID to meter
    meters: HashMap<MeterId, MeterHandle>,
    /// Maximum number of meters allowed
    max_meters: usize,
}

impl MeterRegistry {
    /// Create a registry holding at most `max_meters` meters
    pub fn new(max_meters: usize) -> Self {
        Self {
            meters: HashMap::new(),
            max_meters,
        }
    }

    /// Add a meter under its own id
    pub fn add(&mut self, meter: Meter) -> Result<MeterHandle> {
        let id = meter.id().to_string();

        if self.meters.contains_key(&id) {
            return Err(TrackerError::MeterAlreadyExists(id));
        }

        if self.meters.len() >= self.max_meters {
            return Err(TrackerError::MaxMetersReached {
                max: self.max_meters,
            });
        }

        let handle = Arc::new(Mutex::new(meter));
        self.meters.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Remove a meter
    pub fn remove(&mut self, id: &str) -> Result<MeterHandle> {
        let key = normalize_id(id);
        self.meters
            .remove(key)
            .ok_or_else(|| TrackerError::UnknownMeter(id.to_string()))
    }

    /// Get a meter by bare id or entity id
    pub fn get(&self, id: &str) -> Result<MeterHandle> {
        self.meters
            .get(normalize_id(id))
            .cloned()
            .ok_or_else(|| TrackerError::UnknownMeter(id.to_string()))
    }

    /// Check if a meter exists
    pub fn contains(&self, id: &str) -> bool {
        self.meters.contains_key(normalize_id(id))
    }

    /// Meter ids, sorted
    pub fn ids(&self) -> Vec<MeterId> {
        let mut ids: Vec<MeterId> = self.meters.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Get an iterator over meters
    pub fn iter(&self) -> impl Iterator<Item = (&MeterId, &MeterHandle)> {
        self.meters.iter()
    }

    /// Get the number of meters
    pub fn count(&self) -> usize {
        self.meters.len()
    }

    /// Check if there are no meters
    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }
}

impl Default for MeterRegistry {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeterConfig;

    fn meter(name: &str) -> Meter {
        Meter::new(MeterConfig::new(name, "m3", "water"), 10)
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("sensor.water_m3"), "water_m3");
        assert_eq!(normalize_id(" water_m3 "), "water_m3");
        assert_eq!(normalize_id("binary_sensor.water_m3"), "binary_sensor.water_m3");
    }

    #[test]
    fn test_registry_add() {
        let mut registry = MeterRegistry::new(10);
        registry.add(meter("Water")).unwrap();
        assert_eq!(registry.count(), 1);
        assert!(registry.contains("water_m3"));
        assert!(registry.contains("sensor.water_m3"));
    }

    #[test]
    fn test_registry_duplicate() {
        let mut registry = MeterRegistry::new(10);
        registry.add(meter("Water")).unwrap();
        let result = registry.add(meter("water"));
        assert!(matches!(result, Err(TrackerError::MeterAlreadyExists(_))));
    }

    #[test]
    fn test_registry_max() {
        let mut registry = MeterRegistry::new(2);
        registry.add(meter("A")).unwrap();
        registry.add(meter("B")).unwrap();
        let result = registry.add(meter("C"));
        assert!(matches!(
            result,
            Err(TrackerError::MaxMetersReached { max: 2 })
        ));
    }

    #[test]
    fn test_registry_get_and_remove() {
        let mut registry = MeterRegistry::new(10);
        registry.add(meter("Water")).unwrap();

        let handle = registry.get("sensor.water_m3").unwrap();
        assert_eq!(lock(&handle).id(), "water_m3");
        assert!(matches!(
            registry.get("sensor.gas_m3"),
            Err(TrackerError::UnknownMeter(id)) if id == "sensor.gas_m3"
        ));

        registry.remove("water_m3").unwrap();
        assert!(registry.is_empty());
        assert!(registry.remove("water_m3").is_err());
    }

    #[test]
    fn test_ids_sorted() {
        let mut registry = MeterRegistry::default();
        registry.add(meter("Water")).unwrap();
        registry.add(meter("Gas")).unwrap();
        assert_eq!(registry.ids(), vec!["gas_m3", "water_m3"]);
    }
}
