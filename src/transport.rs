// rfbridge - Sensor radio to mesh bridge
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Collaborator abstractions
//!
//! This module provides the traits the bridge consumes from the mesh
//! transport and the sensor radio, plus in-memory implementations for
//! testing and host-side simulation.

use crate::protocol::{MessageId, NodeAddress, WireFrame};
use crate::sensor::SensorFrame;
use std::collections::VecDeque;

/// Mesh transport used to reach the gateway
///
/// Delivery confirmations come back asynchronously through
/// [`crate::Bridge::on_delivery_confirm`] or an [`crate::Inbox`].
pub trait MeshTransport {
    /// Send a reliable unicast and return the id its confirmation will carry
    fn send_reliable_unicast(&mut self, payload: &[u8], target: NodeAddress) -> MessageId;

    /// Address of this node
    fn local_address(&self) -> NodeAddress;

    /// Transport library version, reported in the attributes snapshot
    fn version(&self) -> String;
}

/// Point-to-point sensor radio
pub trait RadioReceiver {
    /// Read the next received frame, if any
    fn poll_frame(&mut self) -> Option<SensorFrame>;
}

/// A unicast recorded by [`MemoryMesh`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentUnicast {
    /// Id handed back to the caller
    pub id: MessageId,
    /// Destination node
    pub target: NodeAddress,
    /// Raw frame bytes
    pub payload: Vec<u8>,
}

impl SentUnicast {
    /// Decode the recorded bytes
    pub fn frame(&self) -> Option<WireFrame> {
        WireFrame::decode(&self.payload).ok()
    }
}

/// In-memory mesh transport that records every send
///
/// Ids are handed out sequentially starting at 1, skipping 0 on wrap.
#[derive(Debug)]
pub struct MemoryMesh {
    local: NodeAddress,
    next_id: MessageId,
    sent: Vec<SentUnicast>,
}

impl MemoryMesh {
    /// Create a transport for the given local address
    pub fn new(local: NodeAddress) -> Self {
        Self {
            local,
            next_id: 1,
            sent: Vec::new(),
        }
    }

    /// All unicasts sent so far, oldest first
    pub fn sent(&self) -> &[SentUnicast] {
        &self.sent
    }

    /// Most recent unicast
    pub fn last_sent(&self) -> Option<&SentUnicast> {
        self.sent.last()
    }

    /// Remove and return everything sent so far
    pub fn take_sent(&mut self) -> Vec<SentUnicast> {
        std::mem::take(&mut self.sent)
    }

    /// Number of unicasts sent so far
    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }
}

impl Default for MemoryMesh {
    fn default() -> Self {
        Self::new(NodeAddress::new([0x02, 0x00, 0x00, 0x12, 0x34, 0x56]))
    }
}

impl MeshTransport for MemoryMesh {
    fn send_reliable_unicast(&mut self, payload: &[u8], target: NodeAddress) -> MessageId {
        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).unwrap_or(1);
        self.sent.push(SentUnicast {
            id,
            target,
            payload: payload.to_vec(),
        });
        id
    }

    fn local_address(&self) -> NodeAddress {
        self.local
    }

    fn version(&self) -> String {
        "memory".to_string()
    }
}

/// In-memory radio fed by the test or simulation
///
/// Unbounded by default. With a capacity, the oldest unread frame is
/// overwritten when a new one arrives, like a driver's receive FIFO.
#[derive(Debug, Default)]
pub struct MemoryRadio {
    rx_buffer: VecDeque<SensorFrame>,
    capacity: Option<usize>,
    reads: u64,
    overwritten: u64,
}

impl MemoryRadio {
    /// Create an empty radio
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a radio keeping at most `capacity` unread frames
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    /// Queue a frame as if it was received over the air
    pub fn push_frame(&mut self, frame: SensorFrame) {
        if let Some(capacity) = self.capacity {
            while self.rx_buffer.len() >= capacity {
                self.rx_buffer.pop_front();
                self.overwritten += 1;
            }
        }
        self.rx_buffer.push_back(frame);
    }

    /// Unread frames lost to newer ones
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }

    /// Frames not yet read by the bridge
    pub fn pending(&self) -> usize {
        self.rx_buffer.len()
    }

    /// Number of frames the bridge actually read
    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl RadioReceiver for MemoryRadio {
    fn poll_frame(&mut self) -> Option<SensorFrame> {
        let frame = self.rx_buffer.pop_front()?;
        self.reads += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorType;

    #[test]
    fn test_memory_mesh_sequential_ids() {
        let mut mesh = MemoryMesh::default();
        let target = NodeAddress::new([1, 2, 3, 4, 5, 6]);
        assert_eq!(mesh.send_reliable_unicast(&[1], target), 1);
        assert_eq!(mesh.send_reliable_unicast(&[2], target), 2);
        assert_eq!(mesh.sent_count(), 2);
        assert_eq!(mesh.last_sent().unwrap().payload, vec![2]);
        assert_eq!(mesh.take_sent().len(), 2);
        assert_eq!(mesh.sent_count(), 0);
    }

    #[test]
    fn test_memory_mesh_id_wraps_past_zero() {
        let mut mesh = MemoryMesh::default();
        mesh.next_id = MessageId::MAX;
        let target = NodeAddress::new([1, 2, 3, 4, 5, 6]);
        assert_eq!(mesh.send_reliable_unicast(&[], target), MessageId::MAX);
        assert_eq!(mesh.send_reliable_unicast(&[], target), 1);
    }

    #[test]
    fn test_memory_radio_fifo() {
        let mut radio = MemoryRadio::new();
        radio.push_frame(SensorFrame::new(SensorType::Bme280, 1, [0; 5]));
        radio.push_frame(SensorFrame::new(SensorType::Bmp280, 2, [0; 5]));
        assert_eq!(radio.pending(), 2);
        assert_eq!(radio.poll_frame().unwrap().sensor_id, 1);
        assert_eq!(radio.poll_frame().unwrap().sensor_id, 2);
        assert!(radio.poll_frame().is_none());
        assert_eq!(radio.reads(), 2);
    }

    #[test]
    fn test_memory_radio_overwrites_oldest() {
        let mut radio = MemoryRadio::with_capacity(2);
        for id in 1..=3 {
            radio.push_frame(SensorFrame::new(SensorType::TouchSwitch, id, [0; 5]));
        }
        assert_eq!(radio.pending(), 2);
        assert_eq!(radio.overwritten(), 1);
        assert_eq!(radio.poll_frame().unwrap().sensor_id, 2);
    }
}
