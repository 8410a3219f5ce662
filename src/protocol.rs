//! Protocol definitions for the mesh side of the bridge
//!
//! This module defines the types exchanged with the mesh gateway:
//! - Node addresses and transport message ids
//! - Device types and payload kinds
//! - The fixed-size wire frame shared by every message kind
//! - Typed outbound envelopes and inbound gateway messages
//!
//! # Wire format
//!
//! ```text
//! ┌─────────────┬──────────────┬──────────────────────────────┐
//! │ device_type │ payload_kind │ message (200 bytes)          │
//! │ u8          │ u8           │ compact JSON, zero padded    │
//! └─────────────┴──────────────┴──────────────────────────────┘
//! ```

use crate::discovery::Descriptor;
use crate::error::WireError;
use crate::translate::TelemetryRecord;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size of the message area in a wire frame
pub const MESSAGE_SIZE: usize = 200;

/// Header size (device type + payload kind)
pub const HEADER_SIZE: usize = 2;

/// Total wire frame size
pub const FRAME_SIZE: usize = HEADER_SIZE + MESSAGE_SIZE;

/// Transport-assigned id of a reliable unicast
pub type MessageId = u16;

/// Opaque 6-byte mesh node address
///
/// The all-zero address means "no node known".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeAddress(pub [u8; 6]);

impl NodeAddress {
    /// The "none known" address
    pub const NONE: NodeAddress = NodeAddress([0; 6]);

    /// Create from raw bytes
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Check if this is the "none known" address
    pub fn is_none(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for NodeAddress {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| WireError::InvalidAddress(s.to_string()))?;
            if part.len() != 2 {
                return Err(WireError::InvalidAddress(s.to_string()));
            }
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| WireError::InvalidAddress(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(WireError::InvalidAddress(s.to_string()));
        }
        Ok(Self(bytes))
    }
}

/// Kind of device a frame originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DeviceType {
    /// Unset
    #[default]
    None = 0,
    /// Mesh switch
    Switch = 1,
    /// Mesh LED strip
    Led = 2,
    /// Mesh sensor
    Sensor = 3,
    /// Sensor reached through a radio bridge
    RfSensor = 4,
    /// Mesh gateway
    Gateway = 5,
    /// Radio-to-mesh bridge (this device)
    RfGateway = 6,
}

impl DeviceType {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DeviceType::None),
            1 => Some(DeviceType::Switch),
            2 => Some(DeviceType::Led),
            3 => Some(DeviceType::Sensor),
            4 => Some(DeviceType::RfSensor),
            5 => Some(DeviceType::Gateway),
            6 => Some(DeviceType::RfGateway),
            _ => None,
        }
    }
}

/// What a frame's message area holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PayloadKind {
    /// Unset
    #[default]
    None = 0,
    /// Device attributes snapshot
    Attributes = 1,
    /// Liveness heartbeat
    KeepAlive = 2,
    /// Set command
    Set = 3,
    /// State report
    State = 4,
    /// Reopen the configuration portal
    Update = 5,
    /// Restart the device
    Restart = 6,
    /// Discovery descriptor
    Config = 7,
    /// Forwarded sensor telemetry
    Forward = 8,
}

impl PayloadKind {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PayloadKind::None),
            1 => Some(PayloadKind::Attributes),
            2 => Some(PayloadKind::KeepAlive),
            3 => Some(PayloadKind::Set),
            4 => Some(PayloadKind::State),
            5 => Some(PayloadKind::Update),
            6 => Some(PayloadKind::Restart),
            7 => Some(PayloadKind::Config),
            8 => Some(PayloadKind::Forward),
            _ => None,
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PayloadKind::None => "none",
            PayloadKind::Attributes => "attributes",
            PayloadKind::KeepAlive => "keep-alive",
            PayloadKind::Set => "set",
            PayloadKind::State => "state",
            PayloadKind::Update => "update",
            PayloadKind::Restart => "restart",
            PayloadKind::Config => "config",
            PayloadKind::Forward => "forward",
        };
        f.write_str(name)
    }
}

/// A decoded wire frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    /// Sender device type
    pub device_type: DeviceType,
    /// Payload kind
    pub kind: PayloadKind,
    /// Message bytes, without the zero padding
    pub message: Vec<u8>,
}

impl WireFrame {
    /// Create a frame with an empty message
    pub fn empty(device_type: DeviceType, kind: PayloadKind) -> Self {
        Self {
            device_type,
            kind,
            message: Vec::new(),
        }
    }

    /// Create a frame carrying a serialized document
    pub fn with_document<T: Serialize>(
        device_type: DeviceType,
        kind: PayloadKind,
        document: &T,
    ) -> Result<Self, WireError> {
        let message =
            serde_json::to_vec(document).map_err(|e| WireError::Serialize(e.to_string()))?;
        if message.len() > MESSAGE_SIZE {
            return Err(WireError::MessageTooLarge {
                size: message.len(),
                max: MESSAGE_SIZE,
            });
        }
        Ok(Self {
            device_type,
            kind,
            message,
        })
    }

    /// Encode to the fixed-size wire representation
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        if self.message.len() > MESSAGE_SIZE {
            return Err(WireError::MessageTooLarge {
                size: self.message.len(),
                max: MESSAGE_SIZE,
            });
        }
        let mut bytes = Vec::with_capacity(FRAME_SIZE);
        bytes.push(self.device_type as u8);
        bytes.push(self.kind as u8);
        bytes.extend_from_slice(&self.message);
        bytes.resize(FRAME_SIZE, 0);
        Ok(bytes)
    }

    /// Decode a received frame
    ///
    /// Shorter message areas are accepted; the message ends at the first
    /// zero byte.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < HEADER_SIZE {
            return Err(WireError::FrameTooShort {
                needed: HEADER_SIZE,
                available: data.len(),
            });
        }

        let device_type =
            DeviceType::from_u8(data[0]).ok_or(WireError::UnknownDeviceType(data[0]))?;
        let kind = PayloadKind::from_u8(data[1]).ok_or(WireError::UnknownPayloadKind(data[1]))?;

        let body = &data[HEADER_SIZE..data.len().min(FRAME_SIZE)];
        let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());

        Ok(Self {
            device_type,
            kind,
            message: body[..end].to_vec(),
        })
    }

    /// Parse the message as a JSON document
    ///
    /// Returns `None` for an empty or unparsable message.
    pub fn document<T: DeserializeOwned>(&self) -> Option<T> {
        if self.message.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.message).ok()
    }
}

/// Device attributes snapshot sent to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    /// Device kind label
    #[serde(rename = "Type")]
    pub device: String,
    /// Microcontroller label
    #[serde(rename = "MCU")]
    pub mcu: String,
    /// Local node address
    #[serde(rename = "MAC")]
    pub mac: String,
    /// Bridge firmware version
    #[serde(rename = "Firmware")]
    pub firmware: String,
    /// Mesh transport version
    #[serde(rename = "Library")]
    pub library: String,
    /// Human-readable uptime
    #[serde(rename = "Uptime")]
    pub uptime: String,
}

/// Format an uptime as `Days:d Hours:h Mins:m`
pub fn format_uptime(uptime_ms: u64) -> String {
    let secs = uptime_ms / 1000;
    let mins = secs / 60;
    let hours = mins / 60;
    let days = hours / 24;
    format!(
        "Days:{} Hours:{} Mins:{}",
        days,
        hours - days * 24,
        mins - hours * 60
    )
}

/// A message this bridge sends to the gateway
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Attributes snapshot
    Attributes(Attributes),
    /// Our own heartbeat
    KeepAlive,
    /// Discovery descriptor (bridge self-registration or a sensor sub-entity)
    Config(Descriptor),
    /// Translated sensor telemetry
    Forward(TelemetryRecord),
}

impl Envelope {
    /// Payload kind of this envelope
    pub fn kind(&self) -> PayloadKind {
        match self {
            Envelope::Attributes(_) => PayloadKind::Attributes,
            Envelope::KeepAlive => PayloadKind::KeepAlive,
            Envelope::Config(_) => PayloadKind::Config,
            Envelope::Forward(_) => PayloadKind::Forward,
        }
    }

    /// Device type the frame is sent as
    ///
    /// Sensor descriptors are sent on behalf of the radio sensor.
    pub fn device_type(&self) -> DeviceType {
        match self {
            Envelope::Config(descriptor) if descriptor.is_sensor() => DeviceType::RfSensor,
            _ => DeviceType::RfGateway,
        }
    }

    /// Build the wire frame
    pub fn to_frame(&self) -> Result<WireFrame, WireError> {
        let device_type = self.device_type();
        let kind = self.kind();
        match self {
            Envelope::Attributes(attributes) => {
                WireFrame::with_document(device_type, kind, attributes)
            }
            Envelope::KeepAlive => Ok(WireFrame::empty(device_type, kind)),
            Envelope::Config(descriptor) => WireFrame::with_document(device_type, kind, descriptor),
            Envelope::Forward(record) => WireFrame::with_document(device_type, kind, record),
        }
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        self.to_frame()?.encode()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HeartbeatDocument {
    #[serde(rename = "MQTT", default, skip_serializing_if = "Option::is_none")]
    mqtt: Option<String>,
}

const UPSTREAM_ONLINE: &str = "online";
const UPSTREAM_OFFLINE: &str = "offline";

/// A message received from a mesh gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMessage {
    /// Gateway heartbeat with its upstream connectivity
    KeepAlive {
        /// Whether the gateway's own upstream link is up
        upstream_online: bool,
    },
    /// Reopen the configuration portal
    Update,
    /// Restart this device
    Restart,
    /// Any other payload kind
    Other(PayloadKind),
}

impl GatewayMessage {
    /// Interpret a frame; `None` if it was not sent by a gateway
    pub fn from_frame(frame: &WireFrame) -> Option<Self> {
        if frame.device_type != DeviceType::Gateway {
            return None;
        }
        Some(match frame.kind {
            PayloadKind::KeepAlive => {
                let upstream_online = frame
                    .document::<HeartbeatDocument>()
                    .and_then(|doc| doc.mqtt)
                    .map_or(false, |state| state == UPSTREAM_ONLINE);
                GatewayMessage::KeepAlive { upstream_online }
            }
            PayloadKind::Update => GatewayMessage::Update,
            PayloadKind::Restart => GatewayMessage::Restart,
            other => GatewayMessage::Other(other),
        })
    }

    /// Decode raw bytes; malformed or foreign frames give `None`
    pub fn decode(data: &[u8]) -> Option<Self> {
        WireFrame::decode(data)
            .ok()
            .and_then(|frame| Self::from_frame(&frame))
    }

    /// Encode as a gateway would send it
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let frame = match self {
            GatewayMessage::KeepAlive { upstream_online } => {
                let state = if *upstream_online {
                    UPSTREAM_ONLINE
                } else {
                    UPSTREAM_OFFLINE
                };
                let doc = HeartbeatDocument {
                    mqtt: Some(state.to_string()),
                };
                WireFrame::with_document(DeviceType::Gateway, PayloadKind::KeepAlive, &doc)?
            }
            GatewayMessage::Update => WireFrame::empty(DeviceType::Gateway, PayloadKind::Update),
            GatewayMessage::Restart => WireFrame::empty(DeviceType::Gateway, PayloadKind::Restart),
            GatewayMessage::Other(kind) => WireFrame::empty(DeviceType::Gateway, *kind),
        };
        frame.encode()
    }
}
