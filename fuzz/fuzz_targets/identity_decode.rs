//! Fuzzer for the identity payload codec.
//!
//! Feeds arbitrary bytes to the decoder and checks:
//! - decoding never panics, whatever the input
//! - accepted payloads are within bounds and re-encode to the same bytes
//! - rejected payloads are rejected for a verifiable reason

#![no_main]

use earshot_proto::{MAX_IDENTITY_LEN, ProtocolError, decode_identity, encode_identity};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match decode_identity(data) {
        Ok(text) => {
            // Accepted payloads are bounded and round-trip exactly.
            assert!(!text.is_empty());
            assert!(text.len() <= MAX_IDENTITY_LEN);
            assert_eq!(encode_identity(text).as_ref(), data);
        },
        Err(ProtocolError::EmptyPayload) => {
            assert!(data.is_empty());
        },
        Err(ProtocolError::PayloadTooLarge { size, max }) => {
            assert_eq!(size, data.len());
            assert_eq!(max, MAX_IDENTITY_LEN);
            assert!(size > max);
        },
        Err(ProtocolError::InvalidUtf8 { valid_up_to }) => {
            // The reported prefix really is valid UTF-8.
            assert!(std::str::from_utf8(&data[..valid_up_to]).is_ok());
            assert!(std::str::from_utf8(data).is_err());
        },
    }
});
