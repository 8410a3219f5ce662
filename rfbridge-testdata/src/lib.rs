// rfbridge Testdata - Simulated sensor fleets and gateway sessions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # rfbridge Testdata
//!
//! Reproducible simulations for exercising the bridge engine:
//!
//! - **Sensor fleets**: seeded radio frame generators per sensor type
//! - **Simulated gateway**: heartbeats, upstream flaps, lossy confirmations, outages
//! - **Sessions**: hours of simulated time through a real bridge, with invariant checks
//!
//! ## Quick Start
//!
//! ```rust
//! use rfbridge_testdata::{create_home_sensors, run_session, GatewayConfig, SessionConfig};
//!
//! let config = SessionConfig::new()
//!     .with_duration_minutes(30)
//!     .with_seed(7)
//!     .with_gateway(GatewayConfig::new().with_failure_rate(0.1));
//!
//! let report = run_session(&config, create_home_sensors());
//! assert!(report.violations.is_empty());
//! ```

pub mod fleet;
pub mod gateway;
pub mod session;

// Re-exports for convenience
pub use fleet::{create_home_sensors, SensorConfig, SensorFleet};
pub use gateway::{GatewayConfig, SimulatedGateway, Window};
pub use session::{run_session, SessionConfig, SessionReport};
