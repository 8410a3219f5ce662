//! Error types for rfbridge
//!
//! The engine itself has no fatal path: delivery failures are retried, link
//! loss is a state transition and foreign input is ignored. The errors below
//! only surface from the wire codec, the radio frame parser and the
//! persisted configuration helpers.

use thiserror::Error;

/// Result type alias for rfbridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for rfbridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Wire codec error
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// Radio frame error
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors while encoding or decoding mesh wire frames
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WireError {
    /// Serialized document does not fit the fixed message area
    #[error("Message too large: {size} bytes exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// Frame shorter than the fixed header
    #[error("Frame too short: need at least {needed} bytes, got {available}")]
    FrameTooShort { needed: usize, available: usize },

    /// Unknown device type code
    #[error("Unknown device type: {0}")]
    UnknownDeviceType(u8),

    /// Unknown payload kind code
    #[error("Unknown payload kind: {0}")]
    UnknownPayloadKind(u8),

    /// Node address string could not be parsed
    #[error("Invalid node address: {0}")]
    InvalidAddress(String),

    /// Document could not be serialized
    #[error("Serialization failed: {0}")]
    Serialize(String),
}

/// Errors while parsing raw radio frames
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Buffer shorter than the fixed radio payload
    #[error("Radio frame too short: need {needed} bytes, got {available}")]
    TooShort { needed: usize, available: usize },
}

/// Errors related to the persisted device configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Storage backend failed
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Record does not start with the expected magic bytes
    #[error("Invalid record magic")]
    InvalidMagic,

    /// Record checksum mismatch
    #[error("Invalid checksum: expected {expected:08x}, got {actual:08x}")]
    InvalidChecksum { expected: u32, actual: u32 },

    /// Record body could not be decoded
    #[error("Malformed record: {0}")]
    Malformed(String),

    /// A setting failed validation
    #[error("Invalid setting '{field}': {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    /// Storage lock was poisoned by a panicking writer
    #[error("Configuration storage lock poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::Config(ConfigError::InvalidChecksum {
            expected: 0x12345678,
            actual: 0xABCDEF00,
        });
        let msg = format!("{}", err);
        assert!(msg.contains("checksum"));
        assert!(msg.contains("12345678"));
    }

    #[test]
    fn test_error_conversion() {
        let wire_err = WireError::UnknownPayloadKind(42);
        let err: BridgeError = wire_err.into();
        assert!(matches!(err, BridgeError::Wire(_)));
    }
}
