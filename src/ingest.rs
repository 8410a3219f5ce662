//! Radio ingest step
//!
//! One step reads at most one frame from the radio and turns it into
//! outbound traffic:
//!
//! ```text
//! Idle -> frame available -> (known sensor ? skip : discovery) -> translate -> enqueue -> Idle
//! ```
//!
//! The radio is not read at all while the gateway is unreachable; frames
//! stay in the driver, which may overwrite them.

use log::{debug, trace};

use crate::discovery::descriptors_for;
use crate::link::GatewayLink;
use crate::protocol::Envelope;
use crate::queue::OutboundQueue;
use crate::registry::SensorRegistry;
use crate::sensor::SensorId;
use crate::translate::translate;
use crate::transport::{MeshTransport, RadioReceiver};

/// Result of one ingest step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Gateway unreachable, radio left untouched
    Unreachable,
    /// No frame was waiting
    Idle,
    /// A frame was translated and queued
    Forwarded {
        /// Sensor that sent the frame
        sensor_id: SensorId,
        /// Discovery descriptors emitted before the record
        discovered: usize,
    },
}

/// Run one ingest step
pub fn ingest_step<T, R>(
    link: &GatewayLink,
    radio: &mut R,
    registry: &mut SensorRegistry,
    queue: &mut OutboundQueue,
    transport: &mut T,
) -> IngestOutcome
where
    T: MeshTransport + ?Sized,
    R: RadioReceiver + ?Sized,
{
    if !link.reachable {
        return IngestOutcome::Unreachable;
    }

    let Some(frame) = radio.poll_frame() else {
        return IngestOutcome::Idle;
    };
    trace!("radio frame from {} sensor {}", frame.sensor_type, frame.sensor_id);

    let mut discovered = 0;
    if registry.observe(frame.sensor_id).is_new() {
        let descriptors = descriptors_for(frame.sensor_type, frame.sensor_id);
        debug!(
            "new {} sensor {}, {} descriptors",
            frame.sensor_type,
            frame.sensor_id,
            descriptors.len()
        );
        discovered = descriptors.len();
        for descriptor in descriptors {
            queue.enqueue_and_send(link, transport, Envelope::Config(descriptor));
        }
    }

    queue.enqueue_and_send(link, transport, Envelope::Forward(translate(&frame)));

    IngestOutcome::Forwarded {
        sensor_id: frame.sensor_id,
        discovered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{NodeAddress, PayloadKind};
    use crate::sensor::{SensorFrame, SensorType};
    use crate::transport::{MemoryMesh, MemoryRadio};

    fn reachable() -> GatewayLink {
        GatewayLink {
            address: NodeAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            reachable: true,
            upstream_online: Some(true),
        }
    }

    fn kinds(mesh: &MemoryMesh) -> Vec<PayloadKind> {
        mesh.sent()
            .iter()
            .map(|s| s.frame().unwrap().kind)
            .collect()
    }

    #[test]
    fn test_radio_untouched_while_unreachable() {
        let mut radio = MemoryRadio::new();
        radio.push_frame(SensorFrame::new(SensorType::Bme280, 1, [300, 0, 0, 0, 0]));
        let mut registry = SensorRegistry::new();
        let mut queue = OutboundQueue::new();
        let mut mesh = MemoryMesh::default();

        let outcome = ingest_step(
            &GatewayLink::default(),
            &mut radio,
            &mut registry,
            &mut queue,
            &mut mesh,
        );
        assert_eq!(outcome, IngestOutcome::Unreachable);
        assert_eq!(radio.pending(), 1);
        assert_eq!(radio.reads(), 0);
    }

    #[test]
    fn test_idle_without_frame() {
        let mut radio = MemoryRadio::new();
        let mut registry = SensorRegistry::new();
        let mut queue = OutboundQueue::new();
        let mut mesh = MemoryMesh::default();
        let outcome = ingest_step(&reachable(), &mut radio, &mut registry, &mut queue, &mut mesh);
        assert_eq!(outcome, IngestOutcome::Idle);
        assert_eq!(mesh.sent_count(), 0);
    }

    #[test]
    fn test_first_frame_discovers_then_forwards() {
        let link = reachable();
        let mut radio = MemoryRadio::new();
        let mut registry = SensorRegistry::new();
        let mut queue = OutboundQueue::new();
        let mut mesh = MemoryMesh::default();

        radio.push_frame(SensorFrame::new(SensorType::Bme280, 7, [300, 4500, 2150, 10132, 0]));
        radio.push_frame(SensorFrame::new(SensorType::Bme280, 7, [300, 4500, 2150, 10132, 0]));

        let outcome = ingest_step(&link, &mut radio, &mut registry, &mut queue, &mut mesh);
        assert_eq!(
            outcome,
            IngestOutcome::Forwarded {
                sensor_id: 7,
                discovered: 4
            }
        );
        assert_eq!(
            kinds(&mesh),
            vec![
                PayloadKind::Config,
                PayloadKind::Config,
                PayloadKind::Config,
                PayloadKind::Config,
                PayloadKind::Forward
            ]
        );

        let outcome = ingest_step(&link, &mut radio, &mut registry, &mut queue, &mut mesh);
        assert_eq!(
            outcome,
            IngestOutcome::Forwarded {
                sensor_id: 7,
                discovered: 0
            }
        );
        assert_eq!(mesh.sent_count(), 6);
        assert_eq!(queue.len(), 6);
    }

    #[test]
    fn test_reserved_type_registers_without_descriptors() {
        let link = reachable();
        let mut radio = MemoryRadio::new();
        let mut registry = SensorRegistry::new();
        let mut queue = OutboundQueue::new();
        let mut mesh = MemoryMesh::default();

        radio.push_frame(SensorFrame::new(SensorType::Bme680, 9, [280, 1, 2, 3, 4]));
        let outcome = ingest_step(&link, &mut radio, &mut registry, &mut queue, &mut mesh);
        assert_eq!(
            outcome,
            IngestOutcome::Forwarded {
                sensor_id: 9,
                discovered: 0
            }
        );
        assert!(registry.contains(9));
        assert_eq!(kinds(&mesh), vec![PayloadKind::Forward]);
    }
}
