//! Scripted session backend for deterministic testing.
//!
//! `SimAdapter` plays the transport's role without any network: commands
//! are recorded for later assertion, and the completions they would produce
//! are queued so they arrive on the *next* pump, exactly like a real
//! backend whose work finishes between ticks.
//!
//! # Determinism
//!
//! Session ids and invite secrets are minted from a ChaCha20 RNG seeded
//! with a fixed value (0 by default), so a scenario produces the same ids
//! on every run. Use [`SimAdapter::with_seed`] to explore different id
//! sequences while staying reproducible.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use earshot_core::{
    adapter::{AdapterEvent, JoinedSession, SessionAdapter, SessionHandle},
    error::TransportError,
};
use earshot_proto::{PeerId, SessionId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// A command the core issued to the backend.
///
/// Per-peer volume writes are not logged here (they recur every tick);
/// inspect them through [`SimAdapter::volume_of`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `create_session` request
    CreateSession {
        /// Requested capacity
        capacity: u32,
    },
    /// `join_session` request
    JoinSession {
        /// Invitation secret
        secret: String,
    },
    /// `connect_network` request
    ConnectNetwork {
        /// Target session
        session_id: SessionId,
    },
    /// `open_channel` request
    OpenChannel {
        /// Target session
        session_id: SessionId,
        /// Channel number
        channel: u8,
        /// Requested delivery mode
        reliable: bool,
    },
    /// `broadcast_reliable` request
    BroadcastReliable {
        /// Target session
        session_id: SessionId,
        /// Payload
        bytes: Bytes,
    },
    /// `send_unreliable` request
    SendUnreliable {
        /// Target session
        session_id: SessionId,
        /// Target peer
        target: PeerId,
        /// Channel number
        channel: u8,
        /// Payload
        bytes: Bytes,
    },
    /// `set_voice_muted` request
    SetVoiceMuted {
        /// Requested mute state
        muted: bool,
    },
    /// `connect_voice` request
    ConnectVoice {
        /// Target session
        session_id: SessionId,
    },
    /// `update_shared_metadata` request
    UpdateSharedMetadata {
        /// Target session
        session_id: SessionId,
        /// Invite secret
        secret: String,
        /// Reported member count
        current_size: u32,
        /// Reported capacity
        max_size: u32,
    },
}

/// How the adapter answers the next join request.
#[derive(Debug, Clone)]
enum JoinScript {
    /// Accept: mint a handle owned by `owner` and report `members`
    Accept {
        owner: PeerId,
        capacity: u32,
        members: Vec<PeerId>,
    },
    /// Reject with this message
    Reject(String),
}

/// Scripted, deterministic session backend.
pub struct SimAdapter {
    queue: VecDeque<AdapterEvent>,
    commands: Vec<Command>,
    create_failures: u32,
    join_script: JoinScript,
    local_peer: Option<PeerId>,
    volumes: HashMap<PeerId, u8>,
    rng: ChaCha20Rng,
}

impl SimAdapter {
    /// Create an adapter with the default seed (0).
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create an adapter with a specific RNG seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            queue: VecDeque::new(),
            commands: Vec::new(),
            create_failures: 0,
            join_script: JoinScript::Reject("no session scripted for this secret".to_owned()),
            local_peer: None,
            volumes: HashMap::new(),
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Queue an arbitrary event for the next pump.
    pub fn push_event(&mut self, event: AdapterEvent) {
        self.queue.push_back(event);
    }

    /// Fail the next `count` create requests before letting one succeed.
    pub fn fail_next_creates(&mut self, count: u32) {
        self.create_failures = count;
    }

    /// Accept the next join request with the given session shape. The
    /// member list should include the local peer, as a real backend's
    /// member enumeration would.
    pub fn script_join(&mut self, owner: PeerId, capacity: u32, members: Vec<PeerId>) {
        self.join_script = JoinScript::Accept { owner, capacity, members };
    }

    /// Reject the next join request.
    pub fn reject_join(&mut self, reason: impl Into<String>) {
        self.join_script = JoinScript::Reject(reason.into());
    }

    /// Queue the startup event resolving the local user.
    pub fn announce_local_identity(&mut self, peer_id: PeerId, display_name: impl Into<String>) {
        self.local_peer = Some(peer_id);
        self.queue.push_back(AdapterEvent::LocalIdentityReady {
            peer_id,
            display_name: display_name.into(),
        });
    }

    /// Queue an external invitation.
    pub fn deliver_invitation(&mut self, secret: impl Into<String>) {
        self.queue.push_back(AdapterEvent::ExternalJoinRequest { secret: secret.into() });
    }

    /// Queue a peer connect event.
    pub fn connect_peer(&mut self, peer_id: PeerId) {
        self.queue.push_back(AdapterEvent::PeerConnected { peer_id });
    }

    /// Queue a peer disconnect event.
    pub fn disconnect_peer(&mut self, peer_id: PeerId) {
        self.queue.push_back(AdapterEvent::PeerDisconnected { peer_id });
    }

    /// Queue an inbound reliable broadcast payload.
    pub fn deliver_reliable(&mut self, peer_id: PeerId, bytes: impl Into<Bytes>) {
        self.queue.push_back(AdapterEvent::ReliableMessage { peer_id, bytes: bytes.into() });
    }

    /// Queue an inbound unreliable unicast payload.
    pub fn deliver_unreliable(&mut self, peer_id: PeerId, channel: u8, bytes: impl Into<Bytes>) {
        self.queue
            .push_back(AdapterEvent::UnreliableMessage { peer_id, channel, bytes: bytes.into() });
    }

    /// Queue a terminal session disconnect.
    pub fn close_session(&mut self, reason: impl Into<String>) {
        self.queue.push_back(AdapterEvent::SessionClosed { reason: reason.into() });
    }

    /// Every command issued so far, in order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of create requests issued.
    #[must_use]
    pub fn create_requests(&self) -> usize {
        self.commands.iter().filter(|c| matches!(c, Command::CreateSession { .. })).count()
    }

    /// Number of join requests issued.
    #[must_use]
    pub fn join_requests(&self) -> usize {
        self.commands.iter().filter(|c| matches!(c, Command::JoinSession { .. })).count()
    }

    /// Broadcast payloads sent so far, in order.
    #[must_use]
    pub fn broadcasts(&self) -> Vec<Bytes> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::BroadcastReliable { bytes, .. } => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Unicast `(target, channel, payload)` triples sent so far, in order.
    #[must_use]
    pub fn unicasts(&self) -> Vec<(PeerId, u8, Bytes)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::SendUnreliable { target, channel, bytes, .. } => {
                    Some((*target, *channel, bytes.clone()))
                },
                _ => None,
            })
            .collect()
    }

    /// The most recent volume set for a peer, if any.
    #[must_use]
    pub fn volume_of(&self, peer_id: PeerId) -> Option<u8> {
        self.volumes.get(&peer_id).copied()
    }

    fn mint_secret(&mut self) -> String {
        format!("invite-{:08x}", self.rng.r#gen::<u32>())
    }
}

impl Default for SimAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAdapter for SimAdapter {
    fn create_session(&mut self, capacity: u32) {
        self.commands.push(Command::CreateSession { capacity });

        if self.create_failures > 0 {
            self.create_failures -= 1;
            self.queue.push_back(AdapterEvent::CreateResult(Err(TransportError::new(
                "scripted create failure",
            ))));
            return;
        }

        let owner = self.local_peer.unwrap_or_default();
        let handle = SessionHandle {
            id: self.rng.r#gen::<SessionId>(),
            owner_id: owner,
            capacity,
            secret: self.mint_secret(),
        };
        self.queue.push_back(AdapterEvent::CreateResult(Ok(handle)));
    }

    fn join_session(&mut self, secret: &str) {
        self.commands.push(Command::JoinSession { secret: secret.to_owned() });

        match self.join_script.clone() {
            JoinScript::Accept { owner, capacity, members } => {
                let handle = SessionHandle {
                    id: self.rng.r#gen::<SessionId>(),
                    owner_id: owner,
                    capacity,
                    secret: secret.to_owned(),
                };
                self.queue
                    .push_back(AdapterEvent::JoinResult(Ok(JoinedSession { handle, members })));
            },
            JoinScript::Reject(reason) => {
                self.queue.push_back(AdapterEvent::JoinResult(Err(TransportError::new(reason))));
            },
        }
    }

    fn connect_network(&mut self, session_id: SessionId) {
        self.commands.push(Command::ConnectNetwork { session_id });
    }

    fn open_channel(&mut self, session_id: SessionId, channel: u8, reliable: bool) {
        self.commands.push(Command::OpenChannel { session_id, channel, reliable });
    }

    fn broadcast_reliable(&mut self, session_id: SessionId, bytes: Bytes) {
        self.commands.push(Command::BroadcastReliable { session_id, bytes });
        self.queue.push_back(AdapterEvent::BroadcastResult(Ok(())));
    }

    fn send_unreliable(&mut self, session_id: SessionId, target: PeerId, channel: u8, bytes: Bytes) {
        self.commands.push(Command::SendUnreliable { session_id, target, channel, bytes });
    }

    fn set_peer_volume(&mut self, peer_id: PeerId, volume: u8) {
        self.volumes.insert(peer_id, volume);
    }

    fn set_voice_muted(&mut self, muted: bool) {
        self.commands.push(Command::SetVoiceMuted { muted });
    }

    fn connect_voice(&mut self, session_id: SessionId) {
        self.commands.push(Command::ConnectVoice { session_id });
        self.queue.push_back(AdapterEvent::VoiceResult(Ok(())));
    }

    fn update_shared_metadata(
        &mut self,
        session_id: SessionId,
        secret: &str,
        current_size: u32,
        max_size: u32,
    ) {
        self.commands.push(Command::UpdateSharedMetadata {
            session_id,
            secret: secret.to_owned(),
            current_size,
            max_size,
        });
        self.queue.push_back(AdapterEvent::MetadataResult(Ok(())));
    }

    fn pump_events(&mut self) -> Vec<AdapterEvent> {
        self.queue.drain(..).collect()
    }
}
