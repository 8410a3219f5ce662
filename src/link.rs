//! Gateway link monitoring
//!
//! Tracks the single mesh gateway this bridge reports to. The link is
//! reachable from a heartbeat until the heartbeat timeout expires; every
//! heartbeat from the bound gateway re-arms the timeout. The gateway's own
//! upstream connectivity is tracked separately, because only its recovery
//! should trigger re-sending discovery traffic.
//!
//! Only one gateway is bound at a time. While bound, heartbeats from any
//! other node are ignored; a new gateway can only be adopted after the
//! current one timed out.

use std::time::Duration;

use log::{debug, info, trace};

use crate::protocol::NodeAddress;
use crate::timer::Alarm;

/// Default heartbeat timeout
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(15);

/// State of the link to the mesh gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GatewayLink {
    /// Bound gateway, [`NodeAddress::NONE`] when none is known
    pub address: NodeAddress,
    /// True between a heartbeat and its timeout
    pub reachable: bool,
    /// Last known upstream state of the gateway, `None` if unknown
    pub upstream_online: Option<bool>,
}

impl GatewayLink {
    /// Check if `sender` is the bound gateway
    pub fn is_gateway(&self, sender: NodeAddress) -> bool {
        self.reachable && !self.address.is_none() && self.address == sender
    }
}

/// Unicast commands a gateway may send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Make the configuration portal visible again
    ReopenConfigPortal,
    /// Restart the device
    Restart,
}

/// What a heartbeat did to the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Sender is not the bound gateway
    Ignored,
    /// A gateway was bound
    Acquired {
        /// Upstream came online: resynchronize discovery
        resync: bool,
    },
    /// The bound gateway is still alive
    Refreshed {
        /// Upstream came online: resynchronize discovery
        resync: bool,
    },
}

impl HeartbeatOutcome {
    /// Check if a full resynchronization is needed
    pub fn resync(&self) -> bool {
        match self {
            HeartbeatOutcome::Ignored => false,
            HeartbeatOutcome::Acquired { resync } | HeartbeatOutcome::Refreshed { resync } => {
                *resync
            }
        }
    }
}

/// Monitor owning the [`GatewayLink`] and its timeout alarm
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    link: GatewayLink,
    timeout: Duration,
    alarm: Alarm,
}

impl LinkMonitor {
    /// Create a monitor with no gateway bound
    pub fn new(timeout: Duration) -> Self {
        Self {
            link: GatewayLink::default(),
            timeout,
            alarm: Alarm::new(),
        }
    }

    /// Handle a heartbeat broadcast
    pub fn on_heartbeat(
        &mut self,
        sender: NodeAddress,
        upstream_online: bool,
        now_ms: u64,
    ) -> HeartbeatOutcome {
        if sender.is_none() {
            return HeartbeatOutcome::Ignored;
        }

        let acquired = if self.link.address.is_none() {
            true
        } else if self.link.address == sender {
            false
        } else {
            trace!("ignoring heartbeat from {}, bound to {}", sender, self.link.address);
            return HeartbeatOutcome::Ignored;
        };

        self.link.address = sender;
        self.link.reachable = true;
        self.alarm.once(now_ms, self.timeout);

        let resync = upstream_online && self.link.upstream_online != Some(true);
        if self.link.upstream_online != Some(upstream_online) {
            if upstream_online {
                info!("gateway {} upstream online", sender);
            } else {
                info!("gateway {} upstream offline", sender);
            }
        }
        self.link.upstream_online = Some(upstream_online);

        if acquired {
            info!("gateway {} acquired", sender);
            HeartbeatOutcome::Acquired { resync }
        } else {
            debug!("gateway {} heartbeat", sender);
            HeartbeatOutcome::Refreshed { resync }
        }
    }

    /// Fire the heartbeat timeout if due; returns true if the link was lost
    pub fn poll_timeout(&mut self, now_ms: u64) -> bool {
        if self.alarm.poll(now_ms) {
            self.on_timeout()
        } else {
            false
        }
    }

    /// Drop the gateway; returns true if it was reachable
    ///
    /// Idempotent. The caller clears the queue and the registry.
    pub fn on_timeout(&mut self) -> bool {
        let was_reachable = self.link.reachable;
        if was_reachable {
            info!("gateway {} lost", self.link.address);
        }
        self.link = GatewayLink::default();
        self.alarm.cancel();
        was_reachable
    }

    /// Check if a directive from `sender` may be honored
    pub fn authorize(&self, sender: NodeAddress, directive: Directive) -> bool {
        let allowed = self.link.is_gateway(sender);
        if !allowed {
            trace!("rejecting {:?} from {}", directive, sender);
        }
        allowed
    }

    /// Current link state
    pub fn link(&self) -> &GatewayLink {
        &self.link
    }

    /// Bound gateway address
    pub fn address(&self) -> NodeAddress {
        self.link.address
    }

    /// Check if the gateway is reachable
    pub fn is_reachable(&self) -> bool {
        self.link.reachable
    }

    /// When the heartbeat timeout will fire
    pub fn timeout_deadline(&self) -> Option<u64> {
        self.alarm.deadline()
    }
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_TIMEOUT)
    }
}
