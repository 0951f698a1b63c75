//! Earshot protocol vocabulary
//!
//! This crate holds the identifiers and the small wire format
//! shared between the session core and any transport backend.
//!
//! The wire format is a single payload kind: an application identity carried
//! as raw UTF-8 text. The same encoding is used on both delivery paths, the
//! reliable session broadcast and the unreliable per-peer channel, so the
//! receiver never needs to know which path a payload arrived on.
//!
//! # Modules
//!
//! - [`identity`]: identity payload codec (UTF-8 text, bounded)
//! - [`errors`]: protocol error types

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod identity;

pub use errors::{ProtocolError, Result};
pub use identity::{IDENTITY_CHANNEL, MAX_IDENTITY_LEN, decode_identity, encode_identity};

/// Transport-assigned participant identifier.
///
/// Opaque, unique within a session, immutable once assigned. The transport
/// backend owns allocation; the core only compares and stores these.
pub type PeerId = u64;

/// Transport-assigned session identifier.
pub type SessionId = u64;
