//! Error types for the session core.
//!
//! The taxonomy is small:
//!
//! - [`RosterError`]: membership invariant violations. These indicate a bug
//!   in the caller or the transport backend, not a runtime condition, and
//!   the facade treats them as fatal-to-log rather than propagating them.
//! - [`TransportError`]: a transient failure reported by the backend for a
//!   fire-and-forget request. Recovery is per-policy: session creation
//!   retries, joins abort, everything else is logged and dropped.
//! - [`ConfigError`]: rejected host configuration. Caught at the setter so
//!   the attenuation engine never has to handle a degenerate range.
//!
//! Races against vanished peers (identity or position updates for a peer
//! that already disconnected) are expected and are silently ignored by the
//! roster; they do not appear here.

use earshot_proto::PeerId;
use thiserror::Error;

/// Membership invariant violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    /// A peer with this network id is already present
    #[error("duplicate peer id {0} in roster")]
    DuplicatePeer(PeerId),
}

/// A transient failure reported by the transport backend.
///
/// Carries only a human-readable message: the backend's failure detail is
/// opaque to the core, which decides recovery purely by which request
/// failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport request failed: {message}")]
pub struct TransportError {
    /// Backend-provided failure description
    pub message: String,
}

impl TransportError {
    /// Create a new transport error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Rejected host configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The audible range is empty or inverted
    #[error("max distance {max} must exceed min distance {min}")]
    InvalidDistanceRange {
        /// Configured minimum distance
        min: f32,
        /// Configured maximum distance
        max: f32,
    },

    /// A distance bound is NaN or infinite
    #[error("distance bound {value} is not finite")]
    NonFiniteDistance {
        /// The offending value
        value: f32,
    },
}
