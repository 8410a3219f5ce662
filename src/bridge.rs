// rfbridge - Sensor radio to mesh bridge
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Bridge context
//!
//! [`Bridge`] owns every piece of engine state (gateway link, outbound
//! queue, sensor registry, alarms, persisted settings) together with the
//! mesh transport and the radio. Transport callbacks either call the
//! `on_*` methods directly from the poll context, or go through an
//! [`Inbox`] from any thread; inbox events are applied at the start of the
//! next [`Bridge::poll`].
//!
//! # Example
//!
//! ```
//! use rfbridge::{Bridge, BridgeConfig, ConfigStorage, GatewayMessage, MemoryConfigStore};
//! use rfbridge::{MemoryMesh, MemoryRadio, NodeAddress};
//!
//! let storage = ConfigStorage::new(MemoryConfigStore::new());
//! let mut bridge = Bridge::new(
//!     BridgeConfig::default(),
//!     storage,
//!     MemoryMesh::default(),
//!     MemoryRadio::new(),
//!     0,
//! ).unwrap();
//!
//! let gateway = NodeAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
//! let heartbeat = GatewayMessage::KeepAlive { upstream_online: true }.encode().unwrap();
//! bridge.on_broadcast(gateway, &heartbeat, 0);
//!
//! assert!(bridge.link().reachable);
//! ```

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use log::{debug, info, trace, warn};
use serde::Serialize;

use crate::config::{BridgeConfig, ConfigStorage, DeviceConfig};
use crate::discovery::Descriptor;
use crate::error::{ConfigError, Result};
use crate::ingest::{ingest_step, IngestOutcome};
use crate::link::{Directive, GatewayLink, LinkMonitor};
use crate::protocol::{format_uptime, Attributes, Envelope, GatewayMessage, MessageId, NodeAddress};
use crate::queue::{ConfirmOutcome, OutboundQueue};
use crate::registry::SensorRegistry;
use crate::timer::Alarm;
use crate::transport::{MeshTransport, RadioReceiver};

/// Event delivered by the mesh transport runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    /// Broadcast frame received
    Broadcast {
        sender: NodeAddress,
        payload: Vec<u8>,
        now_ms: u64,
    },
    /// Unicast frame received
    Unicast {
        sender: NodeAddress,
        payload: Vec<u8>,
        now_ms: u64,
    },
    /// Delivery confirmation for a reliable unicast
    DeliveryConfirm {
        target: NodeAddress,
        id: MessageId,
        success: bool,
    },
}

/// Cloneable handle feeding events into a [`Bridge`]
#[derive(Debug, Clone)]
pub struct Inbox {
    tx: Sender<MeshEvent>,
}

impl Inbox {
    /// Queue an event; dropped silently if the bridge is gone
    pub fn push(&self, event: MeshEvent) {
        if self.tx.send(event).is_err() {
            trace!("bridge gone, event dropped");
        }
    }

    /// Queue a received broadcast
    pub fn broadcast(&self, sender: NodeAddress, payload: &[u8], now_ms: u64) {
        self.push(MeshEvent::Broadcast {
            sender,
            payload: payload.to_vec(),
            now_ms,
        });
    }

    /// Queue a received unicast
    pub fn unicast(&self, sender: NodeAddress, payload: &[u8], now_ms: u64) {
        self.push(MeshEvent::Unicast {
            sender,
            payload: payload.to_vec(),
            now_ms,
        });
    }

    /// Queue a delivery confirmation
    pub fn delivery_confirm(&self, target: NodeAddress, id: MessageId, success: bool) {
        self.push(MeshEvent::DeliveryConfirm {
            target,
            id,
            success,
        });
    }
}

/// Settings as reported to the configuration UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsReport {
    /// Bridge firmware version
    pub firmware: String,
    /// Mesh network name
    #[serde(rename = "espnowNetName")]
    pub network_name: String,
    /// Display name
    #[serde(rename = "deviceName")]
    pub device_name: String,
}

/// The bridge engine
pub struct Bridge<T: MeshTransport, R: RadioReceiver> {
    config: BridgeConfig,
    storage: ConfigStorage,
    device: DeviceConfig,
    monitor: LinkMonitor,
    queue: OutboundQueue,
    registry: SensorRegistry,
    transport: T,
    radio: R,
    inbox_tx: Sender<MeshEvent>,
    inbox_rx: Receiver<MeshEvent>,
    keep_alive_alarm: Alarm,
    attributes_alarm: Alarm,
    portal_alarm: Alarm,
    keep_alive_due: bool,
    attributes_due: bool,
    portal_open: bool,
    restart_requested: bool,
    started_ms: u64,
}

impl<T: MeshTransport, R: RadioReceiver> Bridge<T, R> {
    /// Start the bridge at `now_ms`
    ///
    /// Loads the persisted settings (writing defaults if none are usable),
    /// opens the configuration portal and arms the periodic alarms.
    pub fn new(
        config: BridgeConfig,
        storage: ConfigStorage,
        transport: T,
        radio: R,
        now_ms: u64,
    ) -> std::result::Result<Self, ConfigError> {
        let device = storage.load_or_init(transport.local_address())?;
        let (inbox_tx, inbox_rx) = mpsc::channel();

        let mut portal_alarm = Alarm::new();
        portal_alarm.once(now_ms, config.portal_window);

        info!(
            "bridge '{}' on network '{}' started as {}",
            device.device_name,
            device.network_name,
            transport.local_address()
        );

        Ok(Self {
            monitor: LinkMonitor::new(config.heartbeat_timeout),
            keep_alive_alarm: Alarm::repeating(now_ms, config.keep_alive_interval),
            attributes_alarm: Alarm::repeating(now_ms, config.attributes_interval),
            portal_alarm,
            config,
            storage,
            device,
            queue: OutboundQueue::new(),
            registry: SensorRegistry::new(),
            transport,
            radio,
            inbox_tx,
            inbox_rx,
            keep_alive_due: true,
            attributes_due: true,
            portal_open: true,
            restart_requested: false,
            started_ms: now_ms,
        })
    }

    /// Handle for feeding transport events from other threads
    pub fn inbox(&self) -> Inbox {
        Inbox {
            tx: self.inbox_tx.clone(),
        }
    }

    /// Handle a received broadcast
    pub fn on_broadcast(&mut self, sender: NodeAddress, payload: &[u8], now_ms: u64) {
        self.expire_if_due(now_ms);
        let Some(message) = GatewayMessage::decode(payload) else {
            trace!("ignoring broadcast from {}", sender);
            return;
        };
        let GatewayMessage::KeepAlive { upstream_online } = message else {
            trace!("ignoring {:?} broadcast from {}", message, sender);
            return;
        };

        let outcome = self.monitor.on_heartbeat(sender, upstream_online, now_ms);
        if outcome.resync() {
            self.resync(now_ms);
        }
    }

    /// Handle a received unicast
    pub fn on_unicast(&mut self, sender: NodeAddress, payload: &[u8], now_ms: u64) {
        self.expire_if_due(now_ms);
        let directive = match GatewayMessage::decode(payload) {
            Some(GatewayMessage::Update) => Directive::ReopenConfigPortal,
            Some(GatewayMessage::Restart) => Directive::Restart,
            other => {
                trace!("ignoring unicast {:?} from {}", other, sender);
                return;
            }
        };
        if !self.monitor.authorize(sender, directive) {
            return;
        }

        match directive {
            Directive::ReopenConfigPortal => self.open_portal(now_ms),
            Directive::Restart => self.request_restart(),
        }
    }

    /// Handle a delivery confirmation
    pub fn on_delivery_confirm(
        &mut self,
        target: NodeAddress,
        id: MessageId,
        success: bool,
    ) -> ConfirmOutcome {
        self.queue.on_confirm(
            self.monitor.link(),
            &mut self.transport,
            target,
            id,
            success,
        )
    }

    /// Run one scheduling step
    ///
    /// Order: inbox events, gateway timeout, periodic sends, one radio
    /// frame, configuration portal expiry.
    pub fn poll(&mut self, now_ms: u64) -> IngestOutcome {
        self.drain_inbox();
        self.expire_if_due(now_ms);

        if self.keep_alive_alarm.poll(now_ms) {
            self.keep_alive_due = true;
        }
        if self.attributes_alarm.poll(now_ms) {
            self.attributes_due = true;
        }
        if self.attributes_due {
            self.send_attributes(now_ms);
        }
        if self.keep_alive_due {
            self.send_keep_alive();
        }

        let outcome = ingest_step(
            self.monitor.link(),
            &mut self.radio,
            &mut self.registry,
            &mut self.queue,
            &mut self.transport,
        );

        if self.portal_alarm.poll(now_ms) {
            info!("configuration portal hidden");
            self.portal_open = false;
        }

        outcome
    }

    fn drain_inbox(&mut self) {
        while let Ok(event) = self.inbox_rx.try_recv() {
            match event {
                MeshEvent::Broadcast {
                    sender,
                    payload,
                    now_ms,
                } => self.on_broadcast(sender, &payload, now_ms),
                MeshEvent::Unicast {
                    sender,
                    payload,
                    now_ms,
                } => self.on_unicast(sender, &payload, now_ms),
                MeshEvent::DeliveryConfirm {
                    target,
                    id,
                    success,
                } => {
                    self.on_delivery_confirm(target, id, success);
                }
            }
        }
    }

    /// Drop the gateway as if its heartbeat timed out
    ///
    /// Returns true if the link was reachable.
    pub fn expire_gateway(&mut self) -> bool {
        let lost = self.monitor.on_timeout();
        if lost {
            self.reset_link_state();
        }
        lost
    }

    /// An overdue timeout applies before any later event is handled
    fn expire_if_due(&mut self, now_ms: u64) {
        if self.monitor.poll_timeout(now_ms) {
            self.reset_link_state();
        }
    }

    fn reset_link_state(&mut self) {
        self.queue.clear();
        self.registry.clear();
    }

    fn resync(&mut self, now_ms: u64) {
        info!("gateway upstream online, resynchronizing");
        self.registry.clear();
        let descriptor = Descriptor::gateway(
            self.device.device_name.clone(),
            self.config.gateway_expire_after,
        );
        self.send(Envelope::Config(descriptor));
        self.send_attributes(now_ms);
        self.send_keep_alive();
    }

    fn send(&mut self, envelope: Envelope) {
        self.queue
            .enqueue_and_send(self.monitor.link(), &mut self.transport, envelope);
    }

    fn send_attributes(&mut self, now_ms: u64) {
        if !self.monitor.is_reachable() {
            return;
        }
        self.attributes_due = false;
        let attributes = self.attributes(now_ms);
        self.send(Envelope::Attributes(attributes));
    }

    fn send_keep_alive(&mut self) {
        if !self.monitor.is_reachable() {
            return;
        }
        self.keep_alive_due = false;
        self.send(Envelope::KeepAlive);
    }

    /// Attributes snapshot at `now_ms`
    pub fn attributes(&self, now_ms: u64) -> Attributes {
        Attributes {
            device: self.config.device_label.clone(),
            mcu: self.config.mcu.clone(),
            mac: self.transport.local_address().to_string(),
            firmware: self.config.firmware.clone(),
            library: self.transport.version(),
            uptime: format_uptime(now_ms.saturating_sub(self.started_ms)),
        }
    }

    /// Persist new settings
    ///
    /// The mesh network name takes effect after a restart.
    pub fn apply_settings(
        &mut self,
        device_name: impl Into<String>,
        network_name: impl Into<String>,
    ) -> Result<()> {
        let device_name = device_name.into();
        let network_name = network_name.into();
        let updated = self
            .storage
            .update(self.transport.local_address(), |cfg| {
                cfg.device_name = device_name;
                cfg.network_name = network_name;
            })
            .map_err(|e| {
                warn!("settings rejected: {}", e);
                e
            })?;
        debug!(
            "settings saved: '{}' on '{}'",
            updated.device_name, updated.network_name
        );
        self.device = updated;
        Ok(())
    }

    /// Settings as shown by the configuration UI
    pub fn settings(&self) -> SettingsReport {
        SettingsReport {
            firmware: self.config.firmware.clone(),
            network_name: self.device.network_name.clone(),
            device_name: self.device.device_name.clone(),
        }
    }

    fn open_portal(&mut self, now_ms: u64) {
        info!("configuration portal opened");
        self.portal_open = true;
        self.portal_alarm.once(now_ms, self.config.portal_window);
    }

    /// Ask the firmware shell to restart the device
    pub fn request_restart(&mut self) {
        info!("restart requested");
        self.restart_requested = true;
    }

    /// Check if a restart was requested
    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    /// Check if the configuration portal is visible
    pub fn portal_open(&self) -> bool {
        self.portal_open
    }

    /// Time left before the portal closes
    pub fn portal_remaining(&self, now_ms: u64) -> Option<Duration> {
        self.portal_alarm
            .deadline()
            .map(|deadline| Duration::from_millis(deadline.saturating_sub(now_ms)))
    }

    /// Current gateway link
    pub fn link(&self) -> &GatewayLink {
        self.monitor.link()
    }

    /// Outbound queue
    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    /// Sensor registry
    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    /// Persisted settings in use
    pub fn device_config(&self) -> &DeviceConfig {
        &self.device
    }

    /// Timing and identity configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Mesh transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mesh transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Radio
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Radio, mutably
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }
}
