//! Device errors

use thiserror::Error;

/// Failure while encoding for, opening or writing to a panel
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Frame dimensions disagree with the panel
    #[error("frame is {}x{}, panel expects {}x{}", .actual.0, .actual.1, .expected.0, .expected.1)]
    ConfigMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("device {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("permission denied opening {vendor_id:04x}:{product_id:04x}: {reason}")]
    PermissionDenied {
        vendor_id: u16,
        product_id: u16,
        reason: String,
    },

    /// The device does not speak the profile's framing
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// Packet `index` could not be written; later packets were not attempted
    #[error("write of packet {index} failed: {reason}")]
    TransportWriteFailed { index: usize, reason: String },

    /// Profile packet math is inconsistent
    #[error("encoding invariant violated: {0}")]
    EncodingInvariantViolation(String),

    #[error("transport is closed")]
    TransportClosed,

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Any other backend failure (enumeration, library init)
    #[error("{0}")]
    Backend(String),
}

/// Failure reported by a single packet write
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct SinkError(pub String);

impl SinkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
