// rfbridge Testdata - Simulated mesh gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Simulated mesh gateway.
//!
//! Plays the gateway side of the mesh: periodic heartbeats carrying the
//! upstream state, and delivery confirmations that fail at a configurable
//! rate. Outage windows silence the gateway completely.

use rand::prelude::*;
use rand::rngs::StdRng;
use rfbridge::{GatewayMessage, NodeAddress};
use serde::{Deserialize, Serialize};

/// A half-open time window `[start_ms, end_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Start in milliseconds.
    pub start_ms: u64,
    /// End in milliseconds.
    pub end_ms: u64,
}

impl Window {
    /// Create a window.
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    /// Check if `t_ms` falls inside.
    pub fn contains(&self, t_ms: u64) -> bool {
        t_ms >= self.start_ms && t_ms < self.end_ms
    }
}

/// Gateway behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway node address.
    pub address: [u8; 6],
    /// Interval between heartbeats in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Probability that a delivery fails.
    pub failure_rate: f64,
    /// Windows during which the gateway is silent and unreachable.
    pub outages: Vec<Window>,
    /// Windows during which the gateway's upstream is offline.
    pub upstream_offline: Vec<Window>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
            heartbeat_interval_ms: 5_000,
            failure_rate: 0.0,
            outages: Vec::new(),
            upstream_offline: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Create the default gateway config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delivery failure rate.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval_ms(mut self, interval_ms: u64) -> Self {
        self.heartbeat_interval_ms = interval_ms.max(1);
        self
    }

    /// Add an outage.
    pub fn with_outage(mut self, start_ms: u64, end_ms: u64) -> Self {
        self.outages.push(Window::new(start_ms, end_ms));
        self
    }

    /// Add an upstream offline period.
    pub fn with_upstream_offline(mut self, start_ms: u64, end_ms: u64) -> Self {
        self.upstream_offline.push(Window::new(start_ms, end_ms));
        self
    }

    /// Gateway address.
    pub fn node_address(&self) -> NodeAddress {
        NodeAddress::new(self.address)
    }
}

/// Simulated gateway driven by a seeded RNG.
#[derive(Debug)]
pub struct SimulatedGateway {
    config: GatewayConfig,
    rng: StdRng,
    next_heartbeat_ms: u64,
}

impl SimulatedGateway {
    /// Create a gateway; the first heartbeat is due at time 0.
    pub fn new(config: GatewayConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            next_heartbeat_ms: 0,
        }
    }

    /// Gateway address.
    pub fn address(&self) -> NodeAddress {
        self.config.node_address()
    }

    /// Check if the gateway is in an outage.
    pub fn is_down(&self, t_ms: u64) -> bool {
        self.config.outages.iter().any(|w| w.contains(t_ms))
    }

    /// Upstream state at `t_ms`.
    pub fn upstream_online(&self, t_ms: u64) -> bool {
        !self.config.upstream_offline.iter().any(|w| w.contains(t_ms))
    }

    /// Encoded heartbeat if one is due and the gateway is up.
    pub fn heartbeat(&mut self, now_ms: u64) -> Option<Vec<u8>> {
        if now_ms < self.next_heartbeat_ms {
            return None;
        }
        while self.next_heartbeat_ms <= now_ms {
            self.next_heartbeat_ms += self.config.heartbeat_interval_ms;
        }
        if self.is_down(now_ms) {
            return None;
        }
        GatewayMessage::KeepAlive {
            upstream_online: self.upstream_online(now_ms),
        }
        .encode()
        .ok()
    }

    /// Decide whether a delivery at `now_ms` succeeds.
    pub fn deliver(&mut self, now_ms: u64) -> bool {
        if self.is_down(now_ms) {
            return false;
        }
        !self.rng.gen_bool(self.config.failure_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_schedule() {
        let mut gateway = SimulatedGateway::new(GatewayConfig::new(), 1);
        assert!(gateway.heartbeat(0).is_some());
        assert!(gateway.heartbeat(4_999).is_none());
        assert!(gateway.heartbeat(5_000).is_some());
    }

    #[test]
    fn test_outage_silences() {
        let config = GatewayConfig::new().with_outage(10_000, 40_000);
        let mut gateway = SimulatedGateway::new(config, 1);
        assert!(gateway.heartbeat(10_000).is_none());
        assert!(!gateway.deliver(20_000));
        assert!(gateway.heartbeat(40_000).is_some());
    }

    #[test]
    fn test_upstream_state_in_heartbeat() {
        let config = GatewayConfig::new().with_upstream_offline(0, 5_000);
        let mut gateway = SimulatedGateway::new(config, 1);
        let first = gateway.heartbeat(0).unwrap();
        assert_eq!(
            GatewayMessage::decode(&first),
            Some(GatewayMessage::KeepAlive {
                upstream_online: false
            })
        );
        let second = gateway.heartbeat(5_000).unwrap();
        assert_eq!(
            GatewayMessage::decode(&second),
            Some(GatewayMessage::KeepAlive {
                upstream_online: true
            })
        );
    }

    #[test]
    fn test_failure_rate_extremes() {
        let mut always = SimulatedGateway::new(GatewayConfig::new(), 9);
        assert!((0..100).all(|t| always.deliver(t)));
        let mut never = SimulatedGateway::new(GatewayConfig::new().with_failure_rate(1.0), 9);
        assert!((0..100).all(|t| !never.deliver(t)));
    }
}
