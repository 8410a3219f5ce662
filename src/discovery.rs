//! Discovery descriptors
//!
//! The first time a sensor id is seen in a gateway epoch, the bridge sends
//! one descriptor per logical sub-entity of that sensor so the dashboard
//! behind the gateway can auto-create it. The tables below are the contract
//! with the gateway and must stay in this order.

use crate::sensor::{SensorId, SensorType};
use serde::{Deserialize, Serialize};

/// Dashboard component kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Numeric sensor
    Sensor,
    /// Two-state sensor
    BinarySensor,
}

/// Dashboard device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Battery voltage
    Voltage,
    /// Relative humidity
    Humidity,
    /// Temperature
    Temperature,
    /// Atmospheric pressure
    Pressure,
    /// Water leak
    Moisture,
    /// Door or window contact
    Door,
    /// Link state of the bridge itself
    Connectivity,
}

/// Expiry for climate readings, in seconds
pub const CLIMATE_EXPIRE_AFTER: u16 = 375;

/// Expiry for the leak state, in seconds
pub const LEAK_EXPIRE_AFTER: u16 = 4500;

/// One row of a sensor's descriptor table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSpec {
    /// Sub-entity number, starting at 1
    pub unit: u8,
    /// Entity kind announced to the gateway
    pub component: Component,
    /// Dashboard device class
    pub device_class: DeviceClass,
    /// Record field holding the value
    pub value_template: &'static str,
    /// Display unit, numeric sensors only
    pub unit_of_measurement: Option<&'static str>,
    /// Seconds after which the value is stale
    pub expire_after: Option<u16>,
    /// Symbols for binary states (on, off)
    pub payloads: Option<(&'static str, &'static str)>,
}

impl DescriptorSpec {
    const fn sensor(
        unit: u8,
        device_class: DeviceClass,
        value_template: &'static str,
        unit_of_measurement: &'static str,
        expire_after: Option<u16>,
    ) -> Self {
        Self {
            unit,
            component: Component::Sensor,
            device_class,
            value_template,
            unit_of_measurement: Some(unit_of_measurement),
            expire_after,
            payloads: None,
        }
    }

    const fn binary(
        unit: u8,
        device_class: DeviceClass,
        expire_after: Option<u16>,
        on: &'static str,
        off: &'static str,
    ) -> Self {
        Self {
            unit,
            component: Component::BinarySensor,
            device_class,
            value_template: "state",
            unit_of_measurement: None,
            expire_after,
            payloads: Some((on, off)),
        }
    }
}

const BATTERY: DescriptorSpec =
    DescriptorSpec::sensor(1, DeviceClass::Voltage, "battery", "V", None);

const CLIMATE_BATTERY: DescriptorSpec = DescriptorSpec::sensor(
    1,
    DeviceClass::Voltage,
    "battery",
    "V",
    Some(CLIMATE_EXPIRE_AFTER),
);

static BME280_TABLE: [DescriptorSpec; 4] = [
    CLIMATE_BATTERY,
    DescriptorSpec::sensor(
        2,
        DeviceClass::Humidity,
        "humidity",
        "%",
        Some(CLIMATE_EXPIRE_AFTER),
    ),
    DescriptorSpec::sensor(
        3,
        DeviceClass::Temperature,
        "temperature",
        "°C",
        Some(CLIMATE_EXPIRE_AFTER),
    ),
    DescriptorSpec::sensor(
        4,
        DeviceClass::Pressure,
        "pressure",
        "мм",
        Some(CLIMATE_EXPIRE_AFTER),
    ),
];

static BMP280_TABLE: [DescriptorSpec; 3] = [
    CLIMATE_BATTERY,
    DescriptorSpec::sensor(
        2,
        DeviceClass::Temperature,
        "temperature",
        "°C",
        Some(CLIMATE_EXPIRE_AFTER),
    ),
    DescriptorSpec::sensor(
        3,
        DeviceClass::Pressure,
        "pressure",
        "мм",
        Some(CLIMATE_EXPIRE_AFTER),
    ),
];

static TOUCH_SWITCH_TABLE: [DescriptorSpec; 1] = [BATTERY];

static WATER_LEAKAGE_TABLE: [DescriptorSpec; 2] = [
    BATTERY,
    DescriptorSpec::binary(
        2,
        DeviceClass::Moisture,
        Some(LEAK_EXPIRE_AFTER),
        "ALARM",
        "DRY",
    ),
];

static OPEN_CLOSE_TABLE: [DescriptorSpec; 2] = [
    BATTERY,
    DescriptorSpec::binary(2, DeviceClass::Door, None, "OPEN", "CLOSE"),
];

/// Descriptor table for a sensor type
///
/// Reserved (BME680, plant humidity) and unknown types have none.
pub fn descriptor_table(sensor_type: SensorType) -> &'static [DescriptorSpec] {
    match sensor_type {
        SensorType::Bme280 => &BME280_TABLE,
        SensorType::Bmp280 => &BMP280_TABLE,
        SensorType::TouchSwitch => &TOUCH_SWITCH_TABLE,
        SensorType::WaterLeakage => &WATER_LEAKAGE_TABLE,
        SensorType::OpenClose => &OPEN_CLOSE_TABLE,
        SensorType::Bme680
        | SensorType::PlantHumidity
        | SensorType::None
        | SensorType::Other(_) => &[],
    }
}

/// A discovery descriptor as sent on the wire
///
/// Either the bridge's own registration (`name` set) or a radio sensor's
/// sub-entity (`sensor_type`/`sensor_id` set). Empty optional fields are
/// left out of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub unit: u8,
    pub component: Component,
    #[serde(rename = "rf_type", default, skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<u8>,
    #[serde(rename = "rf_id", default, skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<SensorId>,
    #[serde(rename = "class")]
    pub device_class: DeviceClass,
    #[serde(rename = "template", default, skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_after: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<String>,
}

impl Descriptor {
    /// Build a sensor descriptor from a table row
    pub fn for_sensor(row: &DescriptorSpec, sensor_type: SensorType, sensor_id: SensorId) -> Self {
        Self {
            name: None,
            unit: row.unit,
            component: row.component,
            sensor_type: Some(sensor_type.code()),
            sensor_id: Some(sensor_id),
            device_class: row.device_class,
            value_template: Some(row.value_template.to_string()),
            unit_of_measurement: row.unit_of_measurement.map(str::to_string),
            expire_after: row.expire_after.filter(|&secs| secs > 0),
            payload_on: row.payloads.map(|(on, _)| on.to_string()),
            payload_off: row.payloads.map(|(_, off)| off.to_string()),
        }
    }

    /// The bridge's own connectivity entity
    pub fn gateway(device_name: impl Into<String>, expire_after: u16) -> Self {
        Self {
            name: Some(device_name.into()),
            unit: 1,
            component: Component::BinarySensor,
            sensor_type: None,
            sensor_id: None,
            device_class: DeviceClass::Connectivity,
            value_template: None,
            unit_of_measurement: None,
            expire_after: Some(expire_after).filter(|&secs| secs > 0),
            payload_on: Some("online".to_string()),
            payload_off: None,
        }
    }

    /// Check if this describes a radio sensor
    pub fn is_sensor(&self) -> bool {
        self.sensor_id.is_some()
    }
}

/// All descriptors to send for a newly seen sensor, in order
pub fn descriptors_for(sensor_type: SensorType, sensor_id: SensorId) -> Vec<Descriptor> {
    descriptor_table(sensor_type)
        .iter()
        .map(|row| Descriptor::for_sensor(row, sensor_type, sensor_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceConfig, MAX_NAME_LEN};
    use crate::protocol::{Envelope, NodeAddress, MESSAGE_SIZE};

    #[test]
    fn test_table_sizes() {
        assert_eq!(descriptor_table(SensorType::Bme280).len(), 4);
        assert_eq!(descriptor_table(SensorType::Bmp280).len(), 3);
        assert_eq!(descriptor_table(SensorType::TouchSwitch).len(), 1);
        assert_eq!(descriptor_table(SensorType::WaterLeakage).len(), 2);
        assert_eq!(descriptor_table(SensorType::OpenClose).len(), 2);
        assert!(descriptor_table(SensorType::Bme680).is_empty());
        assert!(descriptor_table(SensorType::PlantHumidity).is_empty());
        assert!(descriptor_table(SensorType::Other(99)).is_empty());
    }

    #[test]
    fn test_units_are_sequential() {
        for sensor_type in [
            SensorType::Bme280,
            SensorType::Bmp280,
            SensorType::TouchSwitch,
            SensorType::WaterLeakage,
            SensorType::OpenClose,
        ] {
            for (i, row) in descriptor_table(sensor_type).iter().enumerate() {
                assert_eq!(row.unit as usize, i + 1);
            }
        }
    }

    #[test]
    fn test_contact_descriptors() {
        let descriptors = descriptors_for(SensorType::OpenClose, 42);
        assert_eq!(descriptors.len(), 2);

        let battery = &descriptors[0];
        assert_eq!(battery.component, Component::Sensor);
        assert_eq!(battery.device_class, DeviceClass::Voltage);
        assert_eq!(battery.unit_of_measurement.as_deref(), Some("V"));
        assert_eq!(battery.expire_after, None);

        let state = &descriptors[1];
        assert_eq!(state.component, Component::BinarySensor);
        assert_eq!(state.device_class, DeviceClass::Door);
        assert_eq!(state.payload_on.as_deref(), Some("OPEN"));
        assert_eq!(state.payload_off.as_deref(), Some("CLOSE"));
        assert_eq!(state.sensor_id, Some(42));
        assert_eq!(state.sensor_type, Some(7));
    }

    #[test]
    fn test_leak_descriptor_expiry() {
        let descriptors = descriptors_for(SensorType::WaterLeakage, 1);
        assert_eq!(descriptors[1].expire_after, Some(LEAK_EXPIRE_AFTER));
        assert_eq!(descriptors[1].payload_on.as_deref(), Some("ALARM"));
        assert_eq!(descriptors[1].payload_off.as_deref(), Some("DRY"));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let descriptor = &descriptors_for(SensorType::TouchSwitch, 3)[0];
        let value = serde_json::to_value(descriptor).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("expire_after"));
        assert!(!object.contains_key("payload_on"));
        assert!(!object.contains_key("name"));
        assert_eq!(value["component"], "sensor");
        assert_eq!(value["class"], "voltage");
        assert_eq!(value["template"], "battery");
    }

    #[test]
    fn test_gateway_descriptor() {
        let descriptor = Descriptor::gateway("RF gateway 1a2b3c", 30);
        assert!(!descriptor.is_sensor());
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["name"], "RF gateway 1a2b3c");
        assert_eq!(value["component"], "binary_sensor");
        assert_eq!(value["class"], "connectivity");
        assert_eq!(value["payload_on"], "online");
        assert_eq!(value["expire_after"], 30);
    }

    #[test]
    fn test_pressure_unit() {
        let bme280 = descriptors_for(SensorType::Bme280, 1);
        assert_eq!(bme280[3].value_template.as_deref(), Some("pressure"));
        assert_eq!(bme280[3].unit_of_measurement.as_deref(), Some("мм"));
        let bmp280 = descriptors_for(SensorType::Bmp280, 1);
        assert_eq!(bmp280[2].unit_of_measurement.as_deref(), Some("мм"));
    }

    #[test]
    fn test_longest_valid_name_fits_a_frame() {
        // Quotes escape to two bytes each
        let mut config = DeviceConfig::defaults_for(NodeAddress::new([2, 0, 0, 1, 2, 3]));
        config.device_name = "\"".repeat(MAX_NAME_LEN);
        assert!(config.validate().is_ok());

        let descriptor = Descriptor::gateway(config.device_name, u16::MAX);
        let frame = Envelope::Config(descriptor).to_frame().unwrap();
        assert!(frame.message.len() <= MESSAGE_SIZE);
    }

    #[test]
    fn test_every_descriptor_fits_a_frame() {
        for code in 0..=7u8 {
            let sensor_type = SensorType::from_u8(code);
            for descriptor in descriptors_for(sensor_type, u16::MAX) {
                let frame = Envelope::Config(descriptor).to_frame().unwrap();
                assert!(frame.message.len() <= MESSAGE_SIZE);
            }
        }
    }
}
