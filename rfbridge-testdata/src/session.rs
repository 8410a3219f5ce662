// rfbridge Testdata - Bridge sessions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Long-running bridge sessions.
//!
//! A session wires a [`SensorFleet`] and a [`SimulatedGateway`] to a real
//! [`Bridge`] with in-memory collaborators and steps simulated time. Every
//! send is confirmed one tick later, successfully or not according to the
//! gateway. Link invariants are checked after every tick and collected in
//! the report instead of panicking.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rfbridge::{
    Bridge, BridgeConfig, ConfigStorage, ConfirmOutcome, DeviceType, IngestOutcome,
    MemoryConfigStore, MemoryMesh, MemoryRadio, PayloadKind, SensorId, SentUnicast,
};
use serde::{Deserialize, Serialize};

use crate::fleet::{SensorConfig, SensorFleet};
use crate::gateway::{GatewayConfig, SimulatedGateway};

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Simulated duration in milliseconds.
    pub duration_ms: u64,
    /// Time step in milliseconds.
    pub tick_ms: u64,
    /// Random seed for the fleet and the gateway.
    pub seed: u64,
    /// Unread frames the radio keeps before overwriting.
    pub radio_capacity: usize,
    /// Gateway behavior.
    pub gateway: GatewayConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_ms: 3_600_000, // 1 hour
            tick_ms: 500,
            seed: 42,
            radio_capacity: 3,
            gateway: GatewayConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a session config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set duration in minutes.
    pub fn with_duration_minutes(mut self, minutes: u64) -> Self {
        self.duration_ms = minutes * 60_000;
        self
    }

    /// Set the time step.
    pub fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms.max(1);
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the gateway behavior.
    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }
}

/// What happened during a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Simulation steps run.
    pub ticks: u64,
    /// Frames the fleet transmitted.
    pub frames_generated: u64,
    /// Frames lost in the radio before being read.
    pub frames_overwritten: u64,
    /// Records the bridge translated and queued.
    pub records_forwarded: u64,
    /// Records confirmed delivered to the gateway.
    pub records_delivered: u64,
    /// Sensor descriptors confirmed delivered.
    pub descriptors_delivered: u64,
    /// Bridge self-registrations sent.
    pub resyncs: u64,
    /// Transport sends, including retries.
    pub sends: u64,
    /// Deliveries the gateway failed.
    pub failed_deliveries: u64,
    /// Times the bridge lost the gateway.
    pub link_losses: u64,
    /// Largest in-flight queue seen.
    pub max_in_flight: usize,
    /// Delivered records per sensor.
    pub delivered_per_sensor: BTreeMap<SensorId, u64>,
    /// Invariant violations, empty on a healthy run.
    pub violations: Vec<String>,
}

impl SessionReport {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Save report to a JSON file.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// Load a report saved with [`SessionReport::to_json_file`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn record_delivery(&mut self, sent: &SentUnicast) {
        let Some(frame) = sent.frame() else {
            self.violations
                .push(format!("undecodable frame delivered as #{}", sent.id));
            return;
        };
        match frame.kind {
            PayloadKind::Forward => {
                self.records_delivered += 1;
                let id = frame
                    .document::<serde_json::Value>()
                    .and_then(|doc| doc["id"].as_u64())
                    .and_then(|id| SensorId::try_from(id).ok());
                match id {
                    Some(id) => *self.delivered_per_sensor.entry(id).or_insert(0) += 1,
                    None => self
                        .violations
                        .push(format!("record #{} without sensor id", sent.id)),
                }
            }
            PayloadKind::Config if frame.device_type == DeviceType::RfSensor => {
                self.descriptors_delivered += 1;
            }
            _ => {}
        }
    }
}

/// Run a session over `sensors`.
pub fn run_session(config: &SessionConfig, sensors: Vec<SensorConfig>) -> SessionReport {
    let mut report = SessionReport::default();
    let mut fleet = SensorFleet::new(sensors, config.seed, 0);
    let mut gateway = SimulatedGateway::new(config.gateway.clone(), config.seed.wrapping_add(1));

    let storage = ConfigStorage::new(MemoryConfigStore::new());
    let mut bridge = match Bridge::new(
        BridgeConfig::default(),
        storage,
        MemoryMesh::default(),
        MemoryRadio::with_capacity(config.radio_capacity),
        0,
    ) {
        Ok(bridge) => bridge,
        Err(e) => {
            report.violations.push(format!("bridge failed to start: {}", e));
            return report;
        }
    };

    let tick = config.tick_ms.max(1);
    let mut in_flight: Vec<SentUnicast> = Vec::new();
    let mut was_reachable = false;
    let mut t = 0;

    while t <= config.duration_ms {
        for sent in std::mem::take(&mut in_flight) {
            let success = gateway.deliver(t);
            if !success {
                report.failed_deliveries += 1;
            }
            let outcome = bridge.on_delivery_confirm(sent.target, sent.id, success);
            if outcome == ConfirmOutcome::Delivered {
                report.record_delivery(&sent);
            }
        }

        if let Some(heartbeat) = gateway.heartbeat(t) {
            bridge.on_broadcast(gateway.address(), &heartbeat, t);
        }

        for frame in fleet.poll(t) {
            bridge.radio_mut().push_frame(frame);
        }
        while let IngestOutcome::Forwarded { .. } = bridge.poll(t) {
            report.records_forwarded += 1;
        }

        let sent = bridge.transport_mut().take_sent();
        report.sends += sent.len() as u64;
        report.resyncs += sent
            .iter()
            .filter_map(|s| s.frame())
            .filter(|f| f.kind == PayloadKind::Config && f.device_type == DeviceType::RfGateway)
            .count() as u64;
        in_flight.extend(sent);

        check_invariants(&bridge, t, was_reachable, &mut report);
        was_reachable = bridge.link().reachable;

        report.ticks += 1;
        t += tick;
    }

    report.frames_generated = fleet.generated();
    report.frames_overwritten = bridge.radio().overwritten();
    report
}

fn check_invariants(
    bridge: &Bridge<MemoryMesh, MemoryRadio>,
    t: u64,
    was_reachable: bool,
    report: &mut SessionReport,
) {
    let link = bridge.link();
    if was_reachable && !link.reachable {
        report.link_losses += 1;
    }
    if !link.reachable {
        if !link.address.is_none() {
            report
                .violations
                .push(format!("t={}: unreachable but bound to {}", t, link.address));
        }
        if !bridge.queue().is_empty() {
            report.violations.push(format!(
                "t={}: {} messages in flight while unreachable",
                t,
                bridge.queue().len()
            ));
        }
        if !bridge.registry().is_empty() {
            report
                .violations
                .push(format!("t={}: sensors registered while unreachable", t));
        }
    }
    report.max_in_flight = report.max_in_flight.max(bridge.queue().len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_short_clean_session() {
        let config = SessionConfig::new().with_duration_minutes(10);
        let report = run_session(&config, vec![SensorConfig::contact(1)]);
        assert!(report.violations.is_empty(), "{:?}", report.violations);
        assert_eq!(report.link_losses, 0);
        assert_eq!(report.resyncs, 1);
        assert_eq!(report.descriptors_delivered, 2);
        assert!(report.records_delivered >= 9);
    }

    #[test]
    fn test_report_json() {
        let config = SessionConfig::new().with_duration_minutes(1);
        let report = run_session(&config, Vec::new());
        let json = report.to_json().unwrap();
        assert!(json.contains("\"ticks\""));
    }

    #[test]
    fn test_report_json_file() {
        let gateway = GatewayConfig::new().with_failure_rate(0.2);
        let config = SessionConfig::new()
            .with_duration_minutes(5)
            .with_gateway(gateway);
        let report = run_session(&config, vec![SensorConfig::contact(4)]);
        let temp = NamedTempFile::new().unwrap();

        report.to_json_file(temp.path()).unwrap();
        let loaded = SessionReport::from_json_file(temp.path()).unwrap();

        assert_eq!(loaded, report);
        assert_eq!(loaded.delivered_per_sensor.get(&4), report.delivered_per_sensor.get(&4));
    }
}
