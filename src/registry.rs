//! Sensor registry
//!
//! Remembers which radio sensors already had their discovery descriptors
//! sent in the current gateway epoch. Presence of an id is the whole state.

use std::collections::BTreeSet;

use crate::sensor::SensorId;

/// Result of observing a sensor id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First sighting in this epoch; descriptors must be sent
    New,
    /// Already registered
    Known,
}

impl Observation {
    /// Check if this was a first sighting
    pub fn is_new(&self) -> bool {
        matches!(self, Observation::New)
    }
}

/// Set of sensors registered with the current gateway
#[derive(Debug, Default, Clone)]
pub struct SensorRegistry {
    known: BTreeSet<SensorId>,
}

impl SensorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting, inserting the id if it is new
    pub fn observe(&mut self, sensor_id: SensorId) -> Observation {
        if self.known.insert(sensor_id) {
            Observation::New
        } else {
            Observation::Known
        }
    }

    /// Check if a sensor is registered
    pub fn contains(&self, sensor_id: SensorId) -> bool {
        self.known.contains(&sensor_id)
    }

    /// Iterate over registered ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.known.iter().copied()
    }

    /// Number of registered sensors
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Check if no sensor is registered
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Forget every sensor (gateway loss or upstream resync)
    pub fn clear(&mut self) {
        self.known.clear();
    }
}
