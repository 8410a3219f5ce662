//! Radio sensor frames
//!
//! Every sensor on the point-to-point radio sends the same fixed 14-byte
//! payload. The `sensor_type` tag decides which of the shared value fields
//! carry meaning; `value1` is always the battery reading.

use crate::error::FrameError;
use std::fmt;

/// Size of the raw radio payload in bytes
pub const RADIO_FRAME_SIZE: usize = 14;

/// Number of value fields in a frame
pub const VALUE_COUNT: usize = 5;

/// Raw `value2` of a water leakage sensor reporting a leak
pub const LEAK_ALARM: i16 = 1;

/// Raw `value2` of an open/close sensor reporting an open contact
pub const CONTACT_OPEN: i16 = 1;

/// Sensor identifier carried in every frame
pub type SensorId = u16;

/// Kind of sensor behind a radio frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SensorType {
    /// No sensor type set
    #[default]
    None,
    /// Humidity, temperature and pressure
    Bme280,
    /// Temperature and pressure
    Bmp280,
    /// Reserved, not translated yet
    Bme680,
    /// Touch switch (battery only)
    TouchSwitch,
    /// Water leakage detector
    WaterLeakage,
    /// Reserved, not translated yet
    PlantHumidity,
    /// Door/window contact
    OpenClose,
    /// Any code this bridge does not know
    Other(u8),
}

impl SensorType {
    /// Convert from the radio code
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => SensorType::None,
            1 => SensorType::Bme280,
            2 => SensorType::Bmp280,
            3 => SensorType::Bme680,
            4 => SensorType::TouchSwitch,
            5 => SensorType::WaterLeakage,
            6 => SensorType::PlantHumidity,
            7 => SensorType::OpenClose,
            other => SensorType::Other(other),
        }
    }

    /// Radio code of this type
    pub fn code(&self) -> u8 {
        match self {
            SensorType::None => 0,
            SensorType::Bme280 => 1,
            SensorType::Bmp280 => 2,
            SensorType::Bme680 => 3,
            SensorType::TouchSwitch => 4,
            SensorType::WaterLeakage => 5,
            SensorType::PlantHumidity => 6,
            SensorType::OpenClose => 7,
            SensorType::Other(code) => *code,
        }
    }

    /// Types with a slot reserved but no translation or discovery yet
    pub fn is_reserved(&self) -> bool {
        matches!(self, SensorType::Bme680 | SensorType::PlantHumidity)
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorType::None => write!(f, "none"),
            SensorType::Bme280 => write!(f, "BME280"),
            SensorType::Bmp280 => write!(f, "BMP280"),
            SensorType::Bme680 => write!(f, "BME680"),
            SensorType::TouchSwitch => write!(f, "touch-switch"),
            SensorType::WaterLeakage => write!(f, "water-leakage"),
            SensorType::PlantHumidity => write!(f, "plant-humidity"),
            SensorType::OpenClose => write!(f, "open-close"),
            SensorType::Other(code) => write!(f, "unknown({})", code),
        }
    }
}

/// One frame received from the sensor radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFrame {
    /// Which fields of `values` are meaningful
    pub sensor_type: SensorType,
    /// Identifier of the physical sensor
    pub sensor_id: SensorId,
    /// `value1..value5`
    pub values: [i16; VALUE_COUNT],
}

impl SensorFrame {
    /// Create a frame from its parts
    pub fn new(sensor_type: SensorType, sensor_id: SensorId, values: [i16; VALUE_COUNT]) -> Self {
        Self {
            sensor_type,
            sensor_id,
            values,
        }
    }

    /// Get value `n` (1-based, as the sensors number them)
    ///
    /// Out of range indices read as zero.
    pub fn value(&self, n: usize) -> i16 {
        n.checked_sub(1)
            .and_then(|i| self.values.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// Battery voltage in volts (`value1` / 100)
    pub fn battery(&self) -> f64 {
        f64::from(self.value(1)) / 100.0
    }

    /// Parse the raw radio payload
    ///
    /// Layout (little-endian): `[type:u8][pad:u8][id:u16][v1..v5: i16]`.
    /// Bytes beyond the fixed size are ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < RADIO_FRAME_SIZE {
            return Err(FrameError::TooShort {
                needed: RADIO_FRAME_SIZE,
                available: data.len(),
            });
        }

        let sensor_type = SensorType::from_u8(data[0]);
        let sensor_id = u16::from_le_bytes([data[2], data[3]]);
        let mut values = [0i16; VALUE_COUNT];
        for (i, value) in values.iter_mut().enumerate() {
            let offset = 4 + i * 2;
            *value = i16::from_le_bytes([data[offset], data[offset + 1]]);
        }

        Ok(Self {
            sensor_type,
            sensor_id,
            values,
        })
    }

    /// Serialize to the raw radio payload
    pub fn to_bytes(&self) -> [u8; RADIO_FRAME_SIZE] {
        let mut bytes = [0u8; RADIO_FRAME_SIZE];
        bytes[0] = self.sensor_type.code();
        bytes[2..4].copy_from_slice(&self.sensor_id.to_le_bytes());
        for (i, value) in self.values.iter().enumerate() {
            let offset = 4 + i * 2;
            bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_type_codes() {
        for code in 0..=7u8 {
            assert_eq!(SensorType::from_u8(code).code(), code);
        }
        assert_eq!(SensorType::from_u8(42), SensorType::Other(42));
        assert_eq!(SensorType::Other(42).code(), 42);
    }

    #[test]
    fn test_reserved_types() {
        assert!(SensorType::Bme680.is_reserved());
        assert!(SensorType::PlantHumidity.is_reserved());
        assert!(!SensorType::OpenClose.is_reserved());
        assert!(!SensorType::Other(9).is_reserved());
    }

    #[test]
    fn test_parse_raw_frame() {
        let raw = [
            7, 0, // open/close, padding
            42, 0, // id 42
            0x2C, 0x01, // 300
            1, 0, // open
            0, 0, 0, 0, 0, 0,
        ];
        let frame = SensorFrame::from_bytes(&raw).unwrap();
        assert_eq!(frame.sensor_type, SensorType::OpenClose);
        assert_eq!(frame.sensor_id, 42);
        assert_eq!(frame.value(1), 300);
        assert_eq!(frame.value(2), CONTACT_OPEN);
        assert!((frame.battery() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_negative_values() {
        let frame = SensorFrame::new(SensorType::Bmp280, 7, [290, -125, 745, 0, 0]);
        let parsed = SensorFrame::from_bytes(&frame.to_bytes()).unwrap();
        assert_eq!(parsed.value(2), -125);
    }

    #[test]
    fn test_short_frame_rejected() {
        let result = SensorFrame::from_bytes(&[1, 0, 5]);
        assert_eq!(
            result,
            Err(FrameError::TooShort {
                needed: RADIO_FRAME_SIZE,
                available: 3
            })
        );
    }

    #[test]
    fn test_value_out_of_range() {
        let frame = SensorFrame::new(SensorType::Bme280, 1, [1, 2, 3, 4, 5]);
        assert_eq!(frame.value(0), 0);
        assert_eq!(frame.value(5), 5);
        assert_eq!(frame.value(6), 0);
    }
}
