//! Outbound message queue
//!
//! Holds every message sent to the gateway that has not been positively
//! confirmed yet. A negative confirmation re-sends the same bytes under a
//! new transport id, in place. There is no retry limit and no backoff: the
//! whole queue is dropped when the gateway link is lost, which bounds how
//! long a message can be retried.
//!
//! Delivery is at-least-once per message; order across messages is not
//! guaranteed and the gateway may see duplicates.

use log::{debug, trace, warn};

use crate::link::GatewayLink;
use crate::protocol::{Envelope, MessageId, NodeAddress};
use crate::transport::MeshTransport;

/// A message awaiting confirmation
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Transport id of the latest send
    pub id: MessageId,
    /// What was sent
    pub envelope: Envelope,
    /// Encoded frame, resent verbatim on failure
    frame: Vec<u8>,
}

impl OutboundMessage {
    /// Encoded wire frame
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// First sends
    pub sent: u64,
    /// Re-sends after a negative confirmation
    pub retried: u64,
    /// Positive confirmations
    pub confirmed: u64,
    /// Payloads dropped because they could not be encoded
    pub dropped: u64,
}

/// What a delivery confirmation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Not from the bound gateway
    Ignored,
    /// No in-flight message has this id
    Stale,
    /// Message removed
    Delivered,
    /// Message re-sent under a new id
    Resent { new_id: MessageId },
}

/// Queue of in-flight messages to the gateway
#[derive(Debug, Default)]
pub struct OutboundQueue {
    messages: Vec<OutboundMessage>,
    stats: QueueStats,
}

impl OutboundQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `envelope` to the gateway and track it until confirmed
    ///
    /// Does nothing while the gateway is unreachable.
    pub fn enqueue_and_send<T: MeshTransport + ?Sized>(
        &mut self,
        link: &GatewayLink,
        transport: &mut T,
        envelope: Envelope,
    ) {
        if !link.reachable {
            trace!("gateway unreachable, not sending {}", envelope.kind());
            return;
        }

        let frame = match envelope.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping {} payload: {}", envelope.kind(), e);
                self.stats.dropped += 1;
                return;
            }
        };

        let id = transport.send_reliable_unicast(&frame, link.address);
        debug!("sent {} as #{} to {}", envelope.kind(), id, link.address);
        self.stats.sent += 1;
        self.messages.push(OutboundMessage {
            id,
            envelope,
            frame,
        });
    }

    /// Handle a delivery confirmation from the transport
    pub fn on_confirm<T: MeshTransport + ?Sized>(
        &mut self,
        link: &GatewayLink,
        transport: &mut T,
        target: NodeAddress,
        id: MessageId,
        success: bool,
    ) -> ConfirmOutcome {
        if !link.reachable || target != link.address {
            trace!("ignoring confirmation #{} for {}", id, target);
            return ConfirmOutcome::Ignored;
        }

        let Some(index) = self.messages.iter().position(|m| m.id == id) else {
            trace!("stale confirmation #{}", id);
            return ConfirmOutcome::Stale;
        };

        if success {
            let message = self.messages.remove(index);
            debug!("#{} ({}) delivered", id, message.envelope.kind());
            self.stats.confirmed += 1;
            return ConfirmOutcome::Delivered;
        }

        let message = &mut self.messages[index];
        let new_id = transport.send_reliable_unicast(&message.frame, link.address);
        debug!(
            "#{} ({}) failed, resent as #{}",
            id,
            message.envelope.kind(),
            new_id
        );
        message.id = new_id;
        self.stats.retried += 1;
        ConfirmOutcome::Resent { new_id }
    }

    /// Drop every in-flight message
    pub fn clear(&mut self) {
        if !self.messages.is_empty() {
            debug!("dropping {} in-flight messages", self.messages.len());
        }
        self.messages.clear();
    }

    /// Number of in-flight messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Check if a transport id is in flight
    pub fn contains_id(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// In-flight messages, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &OutboundMessage> {
        self.messages.iter()
    }

    /// Delivery counters
    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}
