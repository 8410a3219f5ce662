// rfbridge - Sensor radio to mesh bridge
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Configuration
//!
//! Two kinds of configuration live here:
//!
//! - [`BridgeConfig`]: timing and identity constants, fixed at build or
//!   start time.
//! - [`DeviceConfig`]: the settings persisted in non-volatile storage
//!   (mesh network name and device display name).
//!
//! # Record format
//!
//! The persisted record is little-endian:
//!
//! ```text
//! ┌────────────┬──────────────┬─────────────────┬─────────────┐
//! │ magic "RFBR"│ body len u32 │ JSON body       │ CRC-32 u32  │
//! └────────────┴──────────────┴─────────────────┴─────────────┘
//! ```
//!
//! The CRC covers everything before it. A missing or corrupt record is
//! replaced by defaults, which are written back immediately.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crc::{Crc, CRC_32_ISO_HDLC};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocol::NodeAddress;

/// Magic bytes of a persisted configuration record
pub const RECORD_MAGIC: [u8; 4] = *b"RFBR";

/// Maximum length of a name setting, in bytes
pub const MAX_NAME_LEN: usize = 32;

/// Default mesh network name
pub const DEFAULT_NETWORK_NAME: &str = "DEFAULT";

/// Bridge firmware version
pub const FIRMWARE_VERSION: &str = "1.0";

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Timing and identity configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Gateway is considered lost after this long without a heartbeat
    pub heartbeat_timeout: Duration,
    /// Interval between our own heartbeats
    pub keep_alive_interval: Duration,
    /// Interval between attributes snapshots
    pub attributes_interval: Duration,
    /// How long the configuration portal stays visible
    pub portal_window: Duration,
    /// Expiry announced for the bridge connectivity entity, in seconds
    pub gateway_expire_after: u16,
    /// Device kind label in the attributes snapshot
    pub device_label: String,
    /// Microcontroller label in the attributes snapshot
    pub mcu: String,
    /// Firmware version in the attributes snapshot
    pub firmware: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(15),
            keep_alive_interval: Duration::from_secs(10),
            attributes_interval: Duration::from_secs(60),
            portal_window: Duration::from_secs(300),
            gateway_expire_after: 30,
            device_label: "RF gateway".to_string(),
            mcu: "ESP8266".to_string(),
            firmware: FIRMWARE_VERSION.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with a custom heartbeat timeout
    pub fn with_heartbeat_timeout(heartbeat_timeout: Duration) -> Self {
        Self {
            heartbeat_timeout,
            ..Default::default()
        }
    }

    /// Set the heartbeat and attributes intervals
    pub fn intervals(mut self, keep_alive: Duration, attributes: Duration) -> Self {
        self.keep_alive_interval = keep_alive;
        self.attributes_interval = attributes;
        self
    }

    /// Set the configuration portal window
    pub fn portal_window(mut self, window: Duration) -> Self {
        self.portal_window = window;
        self
    }

    /// Set the microcontroller label
    pub fn mcu(mut self, mcu: impl Into<String>) -> Self {
        self.mcu = mcu.into();
        self
    }
}

/// Settings persisted across restarts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Mesh network name
    pub network_name: String,
    /// Display name of this bridge
    pub device_name: String,
}

impl DeviceConfig {
    /// Defaults for a node, named after the tail of its address
    pub fn defaults_for(local: NodeAddress) -> Self {
        let b = local.as_bytes();
        let chip_id = u32::from_be_bytes([0, b[3], b[4], b[5]]);
        Self {
            network_name: DEFAULT_NETWORK_NAME.to_string(),
            device_name: format!("RF gateway {:x}", chip_id),
        }
    }

    /// Check both names are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_name("network_name", &self.network_name)?;
        validate_name("device_name", &self.device_name)
    }

    /// Serialize to a persisted record
    pub fn to_record(&self) -> Result<Vec<u8>, ConfigError> {
        let body = serde_json::to_vec(self).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        let mut bytes = Vec::with_capacity(RECORD_MAGIC.len() + 4 + body.len() + 4);
        bytes.extend_from_slice(&RECORD_MAGIC);
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&body);
        let checksum = CRC32.checksum(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        Ok(bytes)
    }

    /// Parse and verify a persisted record
    pub fn from_record(data: &[u8]) -> Result<Self, ConfigError> {
        const HEADER: usize = 8;
        if data.len() < HEADER + 4 || data[..4] != RECORD_MAGIC {
            return Err(ConfigError::InvalidMagic);
        }

        let len = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let end = HEADER
            .checked_add(len)
            .filter(|&end| end + 4 <= data.len())
            .ok_or_else(|| ConfigError::Malformed(format!("body length {} out of range", len)))?;

        let stored = u32::from_le_bytes([data[end], data[end + 1], data[end + 2], data[end + 3]]);
        let computed = CRC32.checksum(&data[..end]);
        if stored != computed {
            return Err(ConfigError::InvalidChecksum {
                expected: stored,
                actual: computed,
            });
        }

        let config: DeviceConfig = serde_json::from_slice(&data[HEADER..end])
            .map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

fn validate_name(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidSetting {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if value.len() > MAX_NAME_LEN {
        return Err(ConfigError::InvalidSetting {
            field,
            reason: format!("{} bytes exceeds maximum {}", value.len(), MAX_NAME_LEN),
        });
    }
    // Escaped control characters would overflow the registration frame
    if value.chars().any(char::is_control) {
        return Err(ConfigError::InvalidSetting {
            field,
            reason: "contains control characters".to_string(),
        });
    }
    Ok(())
}

/// Non-volatile storage backend for the configuration record
pub trait ConfigStore {
    /// Read the stored record, `None` if nothing was ever written
    fn load(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Replace the stored record
    fn store(&mut self, record: &[u8]) -> io::Result<()>;
}

/// Record kept in a file
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    /// Use the file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the record file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&mut self) -> io::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&mut self, record: &[u8]) -> io::Result<()> {
        fs::write(&self.path, record)
    }
}

/// In-memory record; clones share the same storage
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    record: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryConfigStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw record
    pub fn record(&self) -> Option<Vec<u8>> {
        self.record.lock().ok().and_then(|record| record.clone())
    }

    /// Overwrite the raw record, e.g. to simulate corruption
    pub fn set_record(&self, bytes: Vec<u8>) {
        if let Ok(mut record) = self.record.lock() {
            *record = Some(bytes);
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.record())
    }

    fn store(&mut self, record: &[u8]) -> io::Result<()> {
        let mut stored = self
            .record
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory store poisoned"))?;
        *stored = Some(record.to_vec());
        Ok(())
    }
}

/// Exclusive access to the configuration store
///
/// Every read-modify-write holds the lock for its whole duration; the guard
/// is released on every exit path, including errors.
pub struct ConfigStorage {
    store: Mutex<Box<dyn ConfigStore + Send>>,
}

impl ConfigStorage {
    /// Wrap a storage backend
    pub fn new(store: impl ConfigStore + Send + 'static) -> Self {
        Self {
            store: Mutex::new(Box::new(store)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Box<dyn ConfigStore + Send>>, ConfigError> {
        self.store.lock().map_err(|_| ConfigError::Poisoned)
    }

    /// Read the configuration, writing defaults if none is usable
    pub fn load_or_init(&self, local: NodeAddress) -> Result<DeviceConfig, ConfigError> {
        let mut store = self.lock()?;
        if let Some(bytes) = store.load()? {
            match DeviceConfig::from_record(&bytes) {
                Ok(config) => {
                    debug!("loaded configuration for '{}'", config.device_name);
                    return Ok(config);
                }
                Err(e) => warn!("stored configuration unusable ({}), using defaults", e),
            }
        }
        let defaults = DeviceConfig::defaults_for(local);
        store.store(&defaults.to_record()?)?;
        Ok(defaults)
    }

    /// Validate and persist a configuration
    pub fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let record = config.to_record()?;
        self.lock()?.store(&record)?;
        Ok(())
    }

    /// Read, modify and write back the configuration as one step
    pub fn update<F>(&self, local: NodeAddress, modify: F) -> Result<DeviceConfig, ConfigError>
    where
        F: FnOnce(&mut DeviceConfig),
    {
        let mut store = self.lock()?;
        let mut config = match store.load()? {
            Some(bytes) => DeviceConfig::from_record(&bytes)
                .unwrap_or_else(|_| DeviceConfig::defaults_for(local)),
            None => DeviceConfig::defaults_for(local),
        };
        modify(&mut config);
        config.validate()?;
        store.store(&config.to_record()?)?;
        Ok(config)
    }
}

impl std::fmt::Debug for ConfigStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStorage").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: NodeAddress = NodeAddress::new([0x5C, 0xCF, 0x7F, 0x1A, 0x2B, 0x3C]);

    #[test]
    fn test_bridge_config_default() {
        let config = BridgeConfig::default();
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(15));
        assert_eq!(config.keep_alive_interval, Duration::from_secs(10));
        assert_eq!(config.attributes_interval, Duration::from_secs(60));
        assert_eq!(config.portal_window, Duration::from_secs(300));
        assert_eq!(config.gateway_expire_after, 30);
    }

    #[test]
    fn test_bridge_config_builders() {
        let config = BridgeConfig::with_heartbeat_timeout(Duration::from_secs(5))
            .intervals(Duration::from_secs(1), Duration::from_secs(2))
            .mcu("ESP32");
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(5));
        assert_eq!(config.keep_alive_interval, Duration::from_secs(1));
        assert_eq!(config.mcu, "ESP32");
    }

    #[test]
    fn test_defaults_named_after_address() {
        let config = DeviceConfig::defaults_for(LOCAL);
        assert_eq!(config.network_name, "DEFAULT");
        assert_eq!(config.device_name, "RF gateway 1a2b3c");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_record_roundtrip() {
        let config = DeviceConfig {
            network_name: "HOME".to_string(),
            device_name: "Garage bridge".to_string(),
        };
        let record = config.to_record().unwrap();
        assert_eq!(&record[..4], b"RFBR");
        assert_eq!(DeviceConfig::from_record(&record).unwrap(), config);
    }

    #[test]
    fn test_record_corruption_detected() {
        let mut record = DeviceConfig::defaults_for(LOCAL).to_record().unwrap();
        let last_body_byte = record.len() - 6;
        record[last_body_byte] ^= 0xFF;
        assert!(matches!(
            DeviceConfig::from_record(&record),
            Err(ConfigError::InvalidChecksum { .. })
        ));
        assert!(matches!(
            DeviceConfig::from_record(b"nope"),
            Err(ConfigError::InvalidMagic)
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = DeviceConfig::defaults_for(LOCAL);
        config.device_name = " ".to_string();
        assert!(config.validate().is_err());
        config.device_name = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSetting {
                field: "device_name",
                ..
            })
        ));
    }

    #[test]
    fn test_control_characters_rejected() {
        let mut config = DeviceConfig::defaults_for(LOCAL);
        config.device_name = "\u{1}".repeat(MAX_NAME_LEN);
        assert!(config.validate().is_err());
        config.device_name = "Kitchen\tdoor".to_string();
        assert!(config.validate().is_err());
        config.device_name = "Küche \"Tür\"".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_init_writes_defaults() {
        let store = MemoryConfigStore::new();
        let storage = ConfigStorage::new(store.clone());
        let config = storage.load_or_init(LOCAL).unwrap();
        assert_eq!(config, DeviceConfig::defaults_for(LOCAL));
        let record = store.record().unwrap();
        assert_eq!(DeviceConfig::from_record(&record).unwrap(), config);
    }

    #[test]
    fn test_load_or_init_replaces_corrupt_record() {
        let store = MemoryConfigStore::new();
        store.set_record(vec![0xFF; 16]);
        let storage = ConfigStorage::new(store.clone());
        let config = storage.load_or_init(LOCAL).unwrap();
        assert_eq!(config, DeviceConfig::defaults_for(LOCAL));
        assert!(DeviceConfig::from_record(&store.record().unwrap()).is_ok());
    }

    #[test]
    fn test_update_rejects_invalid_and_keeps_record() {
        let store = MemoryConfigStore::new();
        let storage = ConfigStorage::new(store.clone());
        storage.load_or_init(LOCAL).unwrap();
        let before = store.record();

        let result = storage.update(LOCAL, |c| c.device_name.clear());
        assert!(result.is_err());
        assert_eq!(store.record(), before);

        let updated = storage
            .update(LOCAL, |c| c.device_name = "Cellar".to_string())
            .unwrap();
        assert_eq!(updated.device_name, "Cellar");
        assert_eq!(storage.load_or_init(LOCAL).unwrap().device_name, "Cellar");
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.cfg");
        let storage = ConfigStorage::new(FileConfigStore::new(&path));

        assert!(!path.exists());
        let config = storage.load_or_init(LOCAL).unwrap();
        assert!(path.exists());

        let reopened = ConfigStorage::new(FileConfigStore::new(&path));
        assert_eq!(reopened.load_or_init(LOCAL).unwrap(), config);
    }
}
