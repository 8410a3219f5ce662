//! Telemetry translation
//!
//! Maps a fixed-layout [`SensorFrame`] onto a semantic record the gateway
//! understands. This is a closed table: adding a sensor type means adding a
//! row here and its descriptor set in [`crate::discovery`].
//!
//! | Type          | Fields                                        |
//! |---------------|-----------------------------------------------|
//! | BME280        | humidity = v2, temperature = v3, pressure = v4 |
//! | BMP280        | temperature = v2, pressure = v3                |
//! | water leakage | state = ALARM / DRY                            |
//! | open/close    | state = OPEN / CLOSE                           |
//! | anything else | battery only                                  |

use crate::sensor::{SensorFrame, SensorId, SensorType, CONTACT_OPEN, LEAK_ALARM};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// State of a water leakage detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakState {
    /// Water detected
    Alarm,
    /// No water
    Dry,
}

impl LeakState {
    /// Symbol sent to the gateway
    pub fn as_str(&self) -> &'static str {
        match self {
            LeakState::Alarm => "ALARM",
            LeakState::Dry => "DRY",
        }
    }
}

/// State of a door/window contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactState {
    /// Contact open
    Open,
    /// Contact closed
    Close,
}

impl ContactState {
    /// Symbol sent to the gateway
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactState::Open => "OPEN",
            ContactState::Close => "CLOSE",
        }
    }
}

/// Type-specific part of a telemetry record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    /// Only the common fields are meaningful
    BatteryOnly,
    /// BME280 climate reading
    Climate {
        humidity: i16,
        temperature: i16,
        pressure: i16,
    },
    /// BMP280 barometric reading
    Barometric { temperature: i16, pressure: i16 },
    /// Water leakage state
    Leak(LeakState),
    /// Open/close contact state
    Contact(ContactState),
}

/// A semantic telemetry record forwarded to the gateway
///
/// Serializes to a flat document: the type-specific fields followed by
/// `type`, `id` and `battery`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    /// Sensor type tag
    pub sensor_type: SensorType,
    /// Sensor identifier
    pub sensor_id: SensorId,
    /// Battery voltage in volts
    pub battery: f64,
    /// Type-specific fields
    pub reading: Reading,
}

impl Serialize for TelemetryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self.reading {
            Reading::BatteryOnly => {}
            Reading::Climate {
                humidity,
                temperature,
                pressure,
            } => {
                map.serialize_entry("humidity", &humidity)?;
                map.serialize_entry("temperature", &temperature)?;
                map.serialize_entry("pressure", &pressure)?;
            }
            Reading::Barometric {
                temperature,
                pressure,
            } => {
                map.serialize_entry("temperature", &temperature)?;
                map.serialize_entry("pressure", &pressure)?;
            }
            Reading::Leak(state) => map.serialize_entry("state", state.as_str())?,
            Reading::Contact(state) => map.serialize_entry("state", state.as_str())?,
        }
        map.serialize_entry("type", &self.sensor_type.code())?;
        map.serialize_entry("id", &self.sensor_id)?;
        map.serialize_entry("battery", &self.battery)?;
        map.end()
    }
}

/// Translate a radio frame into a telemetry record
///
/// Pure: identical frames always give identical records. Reserved and
/// unknown sensor types degrade to a battery-only record.
pub fn translate(frame: &SensorFrame) -> TelemetryRecord {
    let reading = match frame.sensor_type {
        SensorType::Bme280 => Reading::Climate {
            humidity: frame.value(2),
            temperature: frame.value(3),
            pressure: frame.value(4),
        },
        SensorType::Bmp280 => Reading::Barometric {
            temperature: frame.value(2),
            pressure: frame.value(3),
        },
        SensorType::WaterLeakage => Reading::Leak(if frame.value(2) == LEAK_ALARM {
            LeakState::Alarm
        } else {
            LeakState::Dry
        }),
        SensorType::OpenClose => Reading::Contact(if frame.value(2) == CONTACT_OPEN {
            ContactState::Open
        } else {
            ContactState::Close
        }),
        SensorType::TouchSwitch
        | SensorType::Bme680
        | SensorType::PlantHumidity
        | SensorType::None
        | SensorType::Other(_) => Reading::BatteryOnly,
    };

    TelemetryRecord {
        sensor_type: frame.sensor_type,
        sensor_id: frame.sensor_id,
        battery: frame.battery(),
        reading,
    }
}
