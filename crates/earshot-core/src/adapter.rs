//! Transport backend abstraction.
//!
//! The [`SessionAdapter`] trait is the only door between the session core
//! and the outside world. It models a lobby-and-voice service the way the
//! core needs to see it:
//!
//! - **Commands** are fire-and-forget. The caller never blocks; requests
//!   that have a result (create, join, voice, metadata, broadcast) complete
//!   later as pumped events.
//! - **Events** are drained once per tick via [`SessionAdapter::pump_events`]
//!   in the order the backend completed them. The core handles each event
//!   fully, including any follow-up commands it issues, before the next.
//!
//! # Implementations
//!
//! - `SimAdapter` (earshot-harness): scripted, deterministic, records every
//!   command for oracle verification
//! - Production: a thin shim over the host platform's lobby/voice SDK,
//!   buffering that SDK's callbacks until the next pump

use bytes::Bytes;
use earshot_proto::{PeerId, SessionId};

use crate::error::TransportError;

/// A live session as reported by the backend on create or join success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Transport-assigned session id
    pub id: SessionId,
    /// Network id of the peer that created the session
    pub owner_id: PeerId,
    /// Maximum peer count
    pub capacity: u32,
    /// Invite secret, used when publishing shared metadata
    pub secret: String,
}

/// Join success: the handle plus the members already present.
///
/// The member list includes the local peer; the core filters it out by
/// identity comparison when populating the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedSession {
    /// The joined session
    pub handle: SessionHandle,
    /// Network ids of all current members, local peer included
    pub members: Vec<PeerId>,
}

/// Events delivered by [`SessionAdapter::pump_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    /// The backend resolved the local user. Fires exactly once at startup
    /// and is the trigger for the session create path.
    LocalIdentityReady {
        /// Local peer's network id
        peer_id: PeerId,
        /// Transport-level display name (logging only)
        display_name: String,
    },

    /// An external invitation carrying a join secret arrived.
    ExternalJoinRequest {
        /// Opaque secret identifying the target session
        secret: String,
    },

    /// A peer connected to the current session.
    PeerConnected {
        /// The connecting peer
        peer_id: PeerId,
    },

    /// A peer disconnected from the current session.
    PeerDisconnected {
        /// The departing peer
        peer_id: PeerId,
    },

    /// A reliable broadcast payload arrived.
    ReliableMessage {
        /// Sending peer
        peer_id: PeerId,
        /// Raw payload
        bytes: Bytes,
    },

    /// An unreliable unicast payload arrived.
    UnreliableMessage {
        /// Sending peer
        peer_id: PeerId,
        /// Channel the payload was sent on
        channel: u8,
        /// Raw payload
        bytes: Bytes,
    },

    /// Completion of a `create_session` request.
    CreateResult(Result<SessionHandle, TransportError>),

    /// Completion of a `join_session` request.
    JoinResult(Result<JoinedSession, TransportError>),

    /// Completion of a `connect_voice` request.
    VoiceResult(Result<(), TransportError>),

    /// Completion of an `update_shared_metadata` request.
    MetadataResult(Result<(), TransportError>),

    /// Completion of a `broadcast_reliable` request.
    BroadcastResult(Result<(), TransportError>),

    /// The current session was terminally disconnected by the backend.
    SessionClosed {
        /// Backend-provided reason (logging only)
        reason: String,
    },
}

/// Abstract lobby-and-voice backend consumed by the session facade.
///
/// All methods are synchronous and non-blocking. Implementations queue
/// outgoing work internally and surface completions through
/// [`pump_events`](Self::pump_events).
pub trait SessionAdapter {
    /// Request creation of a new session with the given capacity.
    ///
    /// Completes as [`AdapterEvent::CreateResult`].
    fn create_session(&mut self, capacity: u32);

    /// Request joining the session identified by an invite secret.
    ///
    /// Completes as [`AdapterEvent::JoinResult`].
    fn join_session(&mut self, secret: &str);

    /// Connect to the session's message network.
    fn connect_network(&mut self, session_id: SessionId);

    /// Open a numbered message channel on the session network.
    fn open_channel(&mut self, session_id: SessionId, channel: u8, reliable: bool);

    /// Send a payload to every current session member, reliably.
    ///
    /// Completes as [`AdapterEvent::BroadcastResult`].
    fn broadcast_reliable(&mut self, session_id: SessionId, bytes: Bytes);

    /// Send a payload to one peer on a numbered channel, best-effort.
    ///
    /// No completion event; losses are silent.
    fn send_unreliable(&mut self, session_id: SessionId, target: PeerId, channel: u8, bytes: Bytes);

    /// Set the playback volume for one peer, in `0..=200`.
    fn set_peer_volume(&mut self, peer_id: PeerId, volume: u8);

    /// Mute or unmute the local microphone.
    fn set_voice_muted(&mut self, muted: bool);

    /// Request a voice connection for the session.
    ///
    /// Completes as [`AdapterEvent::VoiceResult`].
    fn connect_voice(&mut self, session_id: SessionId);

    /// Publish session metadata for external discovery (invite secret and
    /// party size).
    ///
    /// Completes as [`AdapterEvent::MetadataResult`].
    fn update_shared_metadata(
        &mut self,
        session_id: SessionId,
        secret: &str,
        current_size: u32,
        max_size: u32,
    );

    /// Drain all events completed since the last pump, in completion order.
    ///
    /// Must be called once per host tick.
    fn pump_events(&mut self) -> Vec<AdapterEvent>;
}
