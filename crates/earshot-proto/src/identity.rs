//! Identity payload codec.
//!
//! An identity payload is the application-level name a participant announces
//! to the rest of the session (for a game host, typically a character name).
//! It is raw UTF-8 text with no framing, no sequence numbers, and no version
//! byte: the channel a payload arrives on already identifies it, and
//! last-write-wins semantics make ordering metadata useless to the receiver.
//!
//! # Security
//!
//! - **Bounded decode**: payloads above [`MAX_IDENTITY_LEN`] are rejected
//!   before UTF-8 validation begins, so a hostile peer cannot make the
//!   receiver buffer arbitrary amounts of text.
//! - **Strict UTF-8**: invalid byte sequences are rejected, never replaced.
//!   The caller decides whether to drop or log the payload.

use bytes::Bytes;

use crate::errors::{ProtocolError, Result};

/// Channel number used for identity unicasts on the unreliable path.
///
/// The reliable broadcast path has no channel numbering; this constant only
/// matters for `send_unreliable` and for filtering inbound unreliable
/// messages.
pub const IDENTITY_CHANNEL: u8 = 0;

/// Maximum accepted identity payload length in bytes.
pub const MAX_IDENTITY_LEN: usize = 1024;

/// Encode an application identity for transmission.
///
/// The returned buffer is the UTF-8 bytes of `identity`, nothing more.
#[must_use]
pub fn encode_identity(identity: &str) -> Bytes {
    Bytes::copy_from_slice(identity.as_bytes())
}

/// Decode an inbound identity payload.
///
/// # Errors
///
/// Returns [`ProtocolError::EmptyPayload`] for zero-length input,
/// [`ProtocolError::PayloadTooLarge`] above [`MAX_IDENTITY_LEN`], and
/// [`ProtocolError::InvalidUtf8`] for malformed text.
pub fn decode_identity(bytes: &[u8]) -> Result<&str> {
    if bytes.is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }

    if bytes.len() > MAX_IDENTITY_LEN {
        return Err(ProtocolError::PayloadTooLarge { size: bytes.len(), max: MAX_IDENTITY_LEN });
    }

    std::str::from_utf8(bytes)
        .map_err(|e| ProtocolError::InvalidUtf8 { valid_up_to: e.valid_up_to() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trip() {
        let encoded = encode_identity("Redigit");
        assert_eq!(decode_identity(&encoded), Ok("Redigit"));
    }

    #[test]
    fn identity_preserves_non_ascii() {
        let encoded = encode_identity("日本語プレイヤー");
        assert_eq!(decode_identity(&encoded), Ok("日本語プレイヤー"));
    }

    #[test]
    fn empty_payload_rejected() {
        assert_eq!(decode_identity(b""), Err(ProtocolError::EmptyPayload));
    }

    #[test]
    fn oversized_payload_rejected() {
        let huge = vec![b'a'; MAX_IDENTITY_LEN + 1];
        assert_eq!(
            decode_identity(&huge),
            Err(ProtocolError::PayloadTooLarge { size: MAX_IDENTITY_LEN + 1, max: MAX_IDENTITY_LEN })
        );
    }

    #[test]
    fn invalid_utf8_rejected() {
        // Truncated multi-byte sequence
        let bytes = [b'o', b'k', 0xE6, 0x97];
        assert_eq!(decode_identity(&bytes), Err(ProtocolError::InvalidUtf8 { valid_up_to: 2 }));
    }

    #[test]
    fn max_length_payload_accepted() {
        let text = "x".repeat(MAX_IDENTITY_LEN);
        let encoded = encode_identity(&text);
        assert_eq!(decode_identity(&encoded), Ok(text.as_str()));
    }
}
