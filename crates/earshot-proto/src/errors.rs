//! Error types for the Earshot wire format.
//!
//! All errors are structured, testable, and provide actionable information.

use thiserror::Error;

/// Protocol-level errors that can occur while decoding inbound payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload exceeds the maximum allowed identity length
    #[error("identity payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Actual payload size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Payload is not valid UTF-8
    #[error("identity payload is not valid UTF-8 (error at byte {valid_up_to})")]
    InvalidUtf8 {
        /// Index of the first invalid byte
        valid_up_to: usize,
    },

    /// Payload is empty
    #[error("identity payload is empty")]
    EmptyPayload,
}

/// Convenient Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
