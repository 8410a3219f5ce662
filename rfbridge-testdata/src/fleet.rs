// rfbridge Testdata - Sensor fleets
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Seeded radio sensor fleets.
//!
//! A [`SensorFleet`] owns a set of [`SensorConfig`]s and produces the radio
//! frames they would transmit over time. Values follow simple physical
//! models (diurnal temperature, pressure random walk, battery drain) with
//! Gaussian noise, all driven by a seeded RNG so runs are reproducible.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use rfbridge::{SensorFrame, SensorId, SensorType, CONTACT_OPEN, LEAK_ALARM};
use serde::{Deserialize, Serialize};

const DAY_MS: f64 = 86_400_000.0;

/// Sensor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Radio type code.
    pub type_code: u8,
    /// Sensor identifier.
    pub sensor_id: SensorId,
    /// Interval between reports in milliseconds.
    pub report_interval_ms: u64,
    /// Initial battery level in centivolts.
    pub battery_centivolts: i16,
    /// Probability that a binary sensor changes state between reports.
    pub event_probability: f64,
    /// Standard deviation of measurement noise.
    pub noise_std: f64,
}

impl SensorConfig {
    /// Create a sensor config.
    pub fn new(sensor_type: SensorType, sensor_id: SensorId, report_interval_ms: u64) -> Self {
        Self {
            type_code: sensor_type.code(),
            sensor_id,
            report_interval_ms: report_interval_ms.max(1),
            battery_centivolts: 300,
            event_probability: 0.0,
            noise_std: 0.0,
        }
    }

    /// BME280 climate sensor reporting every 5 minutes.
    pub fn climate(sensor_id: SensorId) -> Self {
        Self::new(SensorType::Bme280, sensor_id, 300_000).with_noise(0.5)
    }

    /// BMP280 barometric sensor reporting every 5 minutes.
    pub fn barometric(sensor_id: SensorId) -> Self {
        Self::new(SensorType::Bmp280, sensor_id, 300_000).with_noise(0.5)
    }

    /// Water leakage detector reporting hourly.
    pub fn leak(sensor_id: SensorId) -> Self {
        Self::new(SensorType::WaterLeakage, sensor_id, 3_600_000).with_event_probability(0.05)
    }

    /// Door contact reporting every minute.
    pub fn contact(sensor_id: SensorId) -> Self {
        Self::new(SensorType::OpenClose, sensor_id, 60_000).with_event_probability(0.2)
    }

    /// Touch switch reporting every 10 minutes.
    pub fn touch(sensor_id: SensorId) -> Self {
        Self::new(SensorType::TouchSwitch, sensor_id, 600_000)
    }

    /// Radio type of this sensor.
    pub fn sensor_type(&self) -> SensorType {
        SensorType::from_u8(self.type_code)
    }

    /// Set the report interval.
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.report_interval_ms = interval_ms.max(1);
        self
    }

    /// Set the initial battery level.
    pub fn with_battery(mut self, centivolts: i16) -> Self {
        self.battery_centivolts = centivolts;
        self
    }

    /// Set the state change probability.
    pub fn with_event_probability(mut self, probability: f64) -> Self {
        self.event_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Add noise to the measurements.
    pub fn with_noise(mut self, std: f64) -> Self {
        self.noise_std = std.max(0.0);
        self
    }
}

/// A typical house: climate in every room, leak detectors, door contacts.
pub fn create_home_sensors() -> Vec<SensorConfig> {
    vec![
        SensorConfig::climate(101),
        SensorConfig::climate(102),
        SensorConfig::climate(103),
        SensorConfig::barometric(110),
        SensorConfig::leak(201),
        SensorConfig::leak(202),
        SensorConfig::contact(301),
        SensorConfig::contact(302),
        SensorConfig::contact(303),
        SensorConfig::touch(401),
        SensorConfig::new(SensorType::Bme680, 501, 300_000),
    ]
}

/// Per-sensor generator state.
#[derive(Debug, Clone)]
struct SensorState {
    next_report_ms: u64,
    reports: u64,
    pressure: f64,
    active: bool,
}

/// Frame generator for a set of sensors.
#[derive(Debug)]
pub struct SensorFleet {
    sensors: Vec<SensorConfig>,
    states: Vec<SensorState>,
    rng: StdRng,
    generated: u64,
}

impl SensorFleet {
    /// Create a fleet starting at `start_ms`.
    ///
    /// Each sensor's first report is placed at a random offset within its
    /// interval, so the fleet does not transmit in lockstep.
    pub fn new(sensors: Vec<SensorConfig>, seed: u64, start_ms: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let states = sensors
            .iter()
            .map(|s| SensorState {
                next_report_ms: start_ms + rng.gen_range(0..s.report_interval_ms),
                reports: 0,
                pressure: rng.gen_range(740.0..760.0),
                active: false,
            })
            .collect();
        Self {
            sensors,
            states,
            rng,
            generated: 0,
        }
    }

    /// Sensors of the fleet.
    pub fn sensors(&self) -> &[SensorConfig] {
        &self.sensors
    }

    /// Number of frames generated so far.
    pub fn generated(&self) -> u64 {
        self.generated
    }

    /// Frames due at `now_ms`, in sensor order.
    pub fn poll(&mut self, now_ms: u64) -> Vec<SensorFrame> {
        let mut frames = Vec::new();
        for i in 0..self.sensors.len() {
            while self.states[i].next_report_ms <= now_ms {
                let at = self.states[i].next_report_ms;
                let frame = self.sample(i, at);
                let state = &mut self.states[i];
                state.next_report_ms += self.sensors[i].report_interval_ms;
                state.reports += 1;
                frames.push(frame);
            }
        }
        self.generated += frames.len() as u64;
        frames
    }

    fn noise(&mut self, std: f64) -> f64 {
        match Normal::new(0.0, std) {
            Ok(normal) if std > 0.0 => normal.sample(&mut self.rng),
            _ => 0.0,
        }
    }

    fn sample(&mut self, index: usize, at_ms: u64) -> SensorFrame {
        let config = self.sensors[index].clone();
        let reports = self.states[index].reports;

        // One centivolt per hundred reports, floored at 2 V
        let battery = (i64::from(config.battery_centivolts) - (reports / 100) as i64).max(200) as i16;

        let phase = (at_ms as f64 / DAY_MS) * std::f64::consts::TAU;
        let temperature = 21.0 + 4.0 * phase.sin() + self.noise(config.noise_std);
        let humidity = (50.0 - (temperature - 21.0) * 2.0 + self.noise(config.noise_std * 2.0))
            .clamp(0.0, 100.0);
        let step = self.noise(0.3);
        let pressure = (self.states[index].pressure + step).clamp(720.0, 780.0);
        self.states[index].pressure = pressure;

        if self.rng.gen_bool(config.event_probability) {
            self.states[index].active = !self.states[index].active;
        }
        let active = self.states[index].active;

        let values = match config.sensor_type() {
            SensorType::Bme280 => [
                battery,
                humidity.round() as i16,
                temperature.round() as i16,
                pressure.round() as i16,
                0,
            ],
            SensorType::Bmp280 => [
                battery,
                temperature.round() as i16,
                pressure.round() as i16,
                0,
                0,
            ],
            SensorType::WaterLeakage => [battery, if active { LEAK_ALARM } else { 0 }, 0, 0, 0],
            SensorType::OpenClose => [battery, if active { CONTACT_OPEN } else { 0 }, 0, 0, 0],
            _ => [battery, self.rng.gen_range(0..100), 0, 0, 0],
        };

        SensorFrame::new(config.sensor_type(), config.sensor_id, values)
    }
}
