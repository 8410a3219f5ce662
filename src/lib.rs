//! # rfbridge - Sensor radio to mesh bridge
//!
//! The engine of a bridge relaying telemetry from a star-topology sensor
//! radio network to a single mesh gateway.
//!
//! ## Key Features
//!
//! - **Gateway link tracking**: heartbeat-driven reachability with timeout
//! - **At-least-once delivery**: confirmation/retry queue toward the gateway
//! - **Sensor auto-registration**: discovery descriptors on first sight
//! - **Telemetry translation**: fixed radio frames to semantic records
//!
//! ## Quick Start
//!
//! ```rust
//! use rfbridge::{Bridge, BridgeConfig, ConfigStorage, GatewayMessage, MemoryConfigStore};
//! use rfbridge::{MemoryMesh, MemoryRadio, NodeAddress, PayloadKind, SensorFrame, SensorType};
//!
//! let mut bridge = Bridge::new(
//!     BridgeConfig::default(),
//!     ConfigStorage::new(MemoryConfigStore::new()),
//!     MemoryMesh::default(),
//!     MemoryRadio::new(),
//!     0,
//! ).unwrap();
//!
//! // A gateway announces itself
//! let gateway = NodeAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
//! let heartbeat = GatewayMessage::KeepAlive { upstream_online: false }.encode().unwrap();
//! bridge.on_broadcast(gateway, &heartbeat, 0);
//!
//! // A door contact reports in
//! bridge.radio_mut().push_frame(SensorFrame::new(SensorType::OpenClose, 42, [295, 1, 0, 0, 0]));
//! bridge.poll(1);
//!
//! let last = bridge.transport().last_sent().unwrap().frame().unwrap();
//! assert_eq!(last.kind, PayloadKind::Forward);
//! ```
//!
//! ## Modules
//!
//! - [`bridge`]: Context object, callbacks and scheduling
//! - [`link`]: Gateway link monitor
//! - [`queue`]: Outbound confirmation/retry queue
//! - [`registry`]: Known radio sensors
//! - [`translate`]: Radio frame to telemetry record
//! - [`discovery`]: Discovery descriptor tables
//! - [`ingest`]: Radio ingest step
//! - [`protocol`]: Mesh wire format
//! - [`sensor`]: Radio frame format
//! - [`config`]: Timing configuration and persisted settings

// Modules
pub mod bridge;
pub mod config;
pub mod discovery;
pub mod error;
pub mod ingest;
pub mod link;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod sensor;
pub mod timer;
pub mod translate;
pub mod transport;

// Re-exports for convenient access
pub use bridge::{Bridge, Inbox, MeshEvent, SettingsReport};
pub use config::{
    BridgeConfig, ConfigStorage, ConfigStore, DeviceConfig, FileConfigStore, MemoryConfigStore,
};
pub use discovery::{Component, Descriptor, DeviceClass};
pub use error::{BridgeError, ConfigError, FrameError, Result, WireError};
pub use ingest::IngestOutcome;
pub use link::{Directive, GatewayLink, HeartbeatOutcome, LinkMonitor};
pub use protocol::{
    Attributes, DeviceType, Envelope, GatewayMessage, MessageId, NodeAddress, PayloadKind,
    WireFrame,
};
pub use queue::{ConfirmOutcome, OutboundMessage, OutboundQueue, QueueStats};
pub use registry::{Observation, SensorRegistry};
pub use sensor::{SensorFrame, SensorId, SensorType, CONTACT_OPEN, LEAK_ALARM};
pub use translate::{translate, ContactState, LeakState, Reading, TelemetryRecord};
pub use transport::{MemoryMesh, MemoryRadio, MeshTransport, RadioReceiver, SentUnicast};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::FIRMWARE_VERSION;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(FIRMWARE_VERSION, "1.0");
    }

    #[test]
    fn test_sensor_roundtrip_through_bridge() {
        let mut bridge = Bridge::new(
            BridgeConfig::default(),
            ConfigStorage::new(MemoryConfigStore::new()),
            MemoryMesh::default(),
            MemoryRadio::new(),
            0,
        )
        .unwrap();
        let gateway = NodeAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        let heartbeat = GatewayMessage::KeepAlive {
            upstream_online: false,
        }
        .encode()
        .unwrap();
        bridge.on_broadcast(gateway, &heartbeat, 0);

        let frame = SensorFrame::new(SensorType::WaterLeakage, 5, [300, 1, 0, 0, 0]);
        let bytes = frame.to_bytes();
        bridge
            .radio_mut()
            .push_frame(SensorFrame::from_bytes(&bytes).unwrap());
        assert_eq!(
            bridge.poll(1),
            IngestOutcome::Forwarded {
                sensor_id: 5,
                discovered: 2
            }
        );
    }
}
