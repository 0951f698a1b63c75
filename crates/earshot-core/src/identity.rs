//! Application identity propagation.
//!
//! Every peer should eventually learn every other peer's application
//! identity (for a game host, the character name behind a network id).
//! Propagation uses both delivery paths:
//!
//! - when the local identity changes with a session live, it is broadcast
//!   reliably to all current members;
//! - when a peer connects, the local identity is unicast to that specific
//!   peer on the unreliable identity channel.
//!
//! Inbound payloads from either path are handled identically by the facade:
//! decode as UTF-8 text, apply last-write-wins to the roster. There are no
//! sequence numbers, so a delayed unicast can overwrite a newer broadcast
//! value; that gap is inherited protocol behavior, kept rather than fixed.
//!
//! The local identity may be set before any session exists; it is held here
//! and applied once the local peer lands in the roster.

use bytes::Bytes;
use earshot_proto::{PeerId, encode_identity};

/// Outgoing identity traffic for the facade to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityAction {
    /// Reliable broadcast to all current session members
    Broadcast {
        /// Encoded identity payload
        payload: Bytes,
    },

    /// Best-effort unicast to one peer on the identity channel
    Unicast {
        /// Target peer
        target: PeerId,
        /// Encoded identity payload
        payload: Bytes,
    },
}

/// Holds the local application identity and decides when to send it.
#[derive(Debug, Default)]
pub struct IdentityExchange {
    local: Option<String>,
}

impl IdentityExchange {
    /// Create an exchange with no local identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The local application identity, if set.
    #[must_use]
    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// Set the local identity.
    ///
    /// Returns a broadcast action when the value changed and a session is
    /// live. Setting the same value again is suppressed, and an empty
    /// string is refused (an identity that decodes to nothing is
    /// indistinguishable from none).
    pub fn set_local(&mut self, identity: String, session_live: bool) -> Vec<IdentityAction> {
        if identity.is_empty() {
            tracing::warn!("empty local identity ignored");
            return Vec::new();
        }

        if self.local.as_deref() == Some(identity.as_str()) {
            tracing::debug!("local identity unchanged");
            return Vec::new();
        }

        tracing::info!(%identity, "local identity set");
        let payload = encode_identity(&identity);
        self.local = Some(identity);

        if session_live {
            vec![IdentityAction::Broadcast { payload }]
        } else {
            Vec::new()
        }
    }

    /// A peer connected: send it the local identity, if one is set.
    #[must_use]
    pub fn greet(&self, peer_id: PeerId) -> Vec<IdentityAction> {
        match &self.local {
            Some(identity) => {
                vec![IdentityAction::Unicast { target: peer_id, payload: encode_identity(identity) }]
            },
            None => Vec::new(),
        }
    }

    /// Broadcast the local identity, if one is set. Used after joining a
    /// session that already has members.
    #[must_use]
    pub fn announce(&self) -> Vec<IdentityAction> {
        match &self.local {
            Some(identity) => vec![IdentityAction::Broadcast { payload: encode_identity(identity) }],
            None => Vec::new(),
        }
    }
}
