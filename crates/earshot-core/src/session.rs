//! The session facade the host drives once per tick.
//!
//! Owns the roster, the lifecycle machine, the identity exchange, and the
//! attenuation configuration, and wires them to a [`SessionAdapter`]. The
//! host's contract is small:
//!
//! - call [`ProximitySession::initialize`] once, [`tick`] every frame, and
//!   [`dispose`] on shutdown;
//! - push local identity and per-peer positions between ticks;
//! - drain [`take_notifications`] whenever it wants roster change events.
//!
//! Every tick pumps the adapter's completed events, dispatches each one
//! fully (including any follow-up requests it triggers) before the next,
//! and then recomputes per-peer volumes from the current roster. All state
//! mutation happens inside that single call chain, so nothing here needs a
//! lock.
//!
//! [`tick`]: ProximitySession::tick
//! [`take_notifications`]: ProximitySession::take_notifications

use std::collections::VecDeque;

use earshot_proto::{IDENTITY_CHANNEL, PeerId, decode_identity};

use crate::{
    adapter::{AdapterEvent, SessionAdapter},
    attenuation::{self, AttenuationConfig},
    error::ConfigError,
    identity::{IdentityAction, IdentityExchange},
    lifecycle::{Lifecycle, LifecycleAction, LifecycleState, Session},
    roster::{IdentityOutcome, Roster},
};

/// Roster change notifications delivered to the host, in pump order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A peer entered the roster
    PeerConnected(PeerId),
    /// A peer left the roster. Fires exactly once per `PeerConnected`,
    /// whether or not the peer was ever identified.
    PeerDisconnected(PeerId),
    /// A peer's application identity changed
    IdentityUpdated {
        /// The identified peer
        peer_id: PeerId,
        /// Its new application identity
        application_id: String,
    },
}

/// Host configuration for a proximity session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Session capacity requested on create
    pub capacity: u32,
    /// Distance at or below which peers play at full volume
    pub min_distance: f32,
    /// Distance at or beyond which peers are silent
    pub max_distance: f32,
    /// Optional cap on session create attempts. `None` retries forever,
    /// which is the inherited default: nobody else can create the session.
    pub max_create_attempts: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { capacity: 4, min_distance: 10.0, max_distance: 100.0, max_create_attempts: None }
    }
}

/// The proximity session manager.
pub struct ProximitySession<A: SessionAdapter> {
    adapter: A,
    roster: Roster,
    lifecycle: Lifecycle,
    identity: IdentityExchange,
    attenuation: AttenuationConfig,
    notifications: VecDeque<Notification>,
    initialized: bool,
}

impl<A: SessionAdapter> ProximitySession<A> {
    /// Create a session manager over the given backend.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configured distance range is
    /// degenerate.
    pub fn new(adapter: A, config: SessionConfig) -> Result<Self, ConfigError> {
        let attenuation = AttenuationConfig::new(config.min_distance, config.max_distance)?;

        Ok(Self {
            adapter,
            roster: Roster::new(),
            lifecycle: Lifecycle::new(config.capacity, config.max_create_attempts),
            identity: IdentityExchange::new(),
            attenuation,
            notifications: VecDeque::new(),
            initialized: false,
        })
    }

    /// Start consuming backend events. Call once.
    pub fn initialize(&mut self) {
        if self.initialized {
            tracing::warn!("already initialized");
            return;
        }

        self.initialized = true;
        tracing::info!("proximity session initialized");
    }

    /// Per-frame entry point: pump backend events, then refresh volumes.
    pub fn tick(&mut self) {
        if !self.initialized {
            return;
        }

        for event in self.adapter.pump_events() {
            self.dispatch(event);
        }

        self.update_volumes();
    }

    /// Tear everything down. Idempotent.
    pub fn dispose(&mut self) {
        if !self.initialized {
            return;
        }

        tracing::info!("proximity session disposed");
        let actions = self.lifecycle.teardown();
        self.apply_lifecycle(actions);
        self.identity = IdentityExchange::new();
        self.initialized = false;
    }

    /// Change the session capacity, effective immediately if live.
    pub fn set_capacity(&mut self, capacity: u32) {
        let actions = self.lifecycle.set_capacity(capacity);
        self.apply_lifecycle(actions);
    }

    /// Set the local application identity.
    ///
    /// Broadcast to current members when a session is live; otherwise
    /// remembered and announced when one exists. Always mirrored into the
    /// local roster entry without a network round trip.
    pub fn set_local_application_id(&mut self, identity: impl Into<String>) {
        let live = self.lifecycle.state().is_live();
        let actions = self.identity.set_local(identity.into(), live);

        if let (Some(current), Some(local_id)) =
            (self.identity.local().map(str::to_owned), self.lifecycle.local_peer())
            && self.roster.set_application_id(local_id, &current) == IdentityOutcome::Updated
        {
            self.notifications
                .push_back(Notification::IdentityUpdated { peer_id: local_id, application_id: current });
        }

        self.apply_identity(actions);
    }

    /// Report a peer's position for this frame. Unknown peers are ignored;
    /// position reports race disconnects.
    pub fn set_peer_position(&mut self, peer_id: PeerId, x: f32, y: f32, z: f32) {
        if !self.roster.set_position(peer_id, x, y, z) {
            tracing::debug!(peer_id, "position for unknown peer ignored");
        }
    }

    /// Mute or unmute the local microphone.
    pub fn set_voice_muted(&mut self, muted: bool) {
        self.adapter.set_voice_muted(muted);
    }

    /// The application identity of a peer, if known.
    #[must_use]
    pub fn application_id(&self, peer_id: PeerId) -> Option<&str> {
        self.roster.find(peer_id).and_then(|peer| peer.application_id())
    }

    /// The network id behind an application identity, if any peer has
    /// claimed it.
    #[must_use]
    pub fn network_id(&self, application_id: &str) -> Option<PeerId> {
        self.roster.find_by_application_id(application_id).map(|peer| peer.network_id())
    }

    /// Number of peers in the roster, local included.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.roster.len()
    }

    /// Network id of the peer at the given roster index. Index 0 is the
    /// local peer while the roster is non-empty.
    #[must_use]
    pub fn peer_network_id_at(&self, index: usize) -> Option<PeerId> {
        self.roster.network_id_at(index)
    }

    /// Distance at or below which peers play at full volume.
    #[must_use]
    pub fn min_distance(&self) -> f32 {
        self.attenuation.min_distance()
    }

    /// Update the minimum audible distance.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the resulting range would be degenerate.
    pub fn set_min_distance(&mut self, value: f32) -> Result<(), ConfigError> {
        self.attenuation.set_min_distance(value)
    }

    /// Distance at or beyond which peers are silent.
    #[must_use]
    pub fn max_distance(&self) -> f32 {
        self.attenuation.max_distance()
    }

    /// Update the maximum audible distance.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the resulting range would be degenerate.
    pub fn set_max_distance(&mut self, value: f32) -> Result<(), ConfigError> {
        self.attenuation.set_max_distance(value)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// The live session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.lifecycle.session()
    }

    /// The local peer's network id, once the backend has reported it.
    #[must_use]
    pub fn local_peer_id(&self) -> Option<PeerId> {
        self.lifecycle.local_peer()
    }

    /// Drain accumulated roster notifications, in pump order.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    /// The underlying backend.
    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The underlying backend, mutably.
    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    fn dispatch(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::LocalIdentityReady { peer_id, display_name } => {
                if self.lifecycle.local_peer().is_some() {
                    tracing::warn!(peer_id, "duplicate local identity event ignored");
                    return;
                }

                tracing::info!(peer_id, %display_name, "local user resolved");
                self.adapter.set_voice_muted(false);

                let actions = self.lifecycle.handle_local_identity_ready(peer_id);
                self.admit_local_peer(peer_id);
                self.apply_lifecycle(actions);
            },

            AdapterEvent::ExternalJoinRequest { secret } => {
                let actions = self.lifecycle.handle_join_request(&secret);
                self.apply_lifecycle(actions);
            },

            AdapterEvent::PeerConnected { peer_id } => {
                if self.lifecycle.local_peer().is_none() {
                    tracing::warn!(peer_id, "peer connected before local identity, ignored");
                    return;
                }

                if self.insert_peer(peer_id) {
                    let actions = self.identity.greet(peer_id);
                    self.apply_identity(actions);
                    self.refresh_metadata();
                }
            },

            AdapterEvent::PeerDisconnected { peer_id } => {
                if self.roster.remove(peer_id) {
                    self.notifications.push_back(Notification::PeerDisconnected(peer_id));
                    self.refresh_metadata();
                } else {
                    tracing::debug!(peer_id, "disconnect for unknown peer ignored");
                }
            },

            AdapterEvent::ReliableMessage { peer_id, bytes } => {
                self.handle_identity_payload(peer_id, &bytes);
            },

            AdapterEvent::UnreliableMessage { peer_id, channel, bytes } => {
                if channel != IDENTITY_CHANNEL {
                    tracing::debug!(peer_id, channel, "message on unknown channel ignored");
                    return;
                }
                self.handle_identity_payload(peer_id, &bytes);
            },

            AdapterEvent::CreateResult(result) => {
                let actions = self.lifecycle.handle_create_result(result);
                self.apply_lifecycle(actions);
            },

            AdapterEvent::JoinResult(result) => {
                let actions = self.lifecycle.handle_join_result(result);
                self.apply_lifecycle(actions);
            },

            AdapterEvent::VoiceResult(result) => match result {
                Ok(()) => tracing::info!("voice connected"),
                Err(error) => tracing::warn!(%error, "voice connection failed"),
            },

            AdapterEvent::MetadataResult(result) => {
                if let Err(error) = result {
                    tracing::warn!(%error, "metadata publish failed");
                }
            },

            AdapterEvent::BroadcastResult(result) => {
                if let Err(error) = result {
                    tracing::warn!(%error, "identity broadcast failed");
                }
            },

            AdapterEvent::SessionClosed { reason } => {
                let actions = self.lifecycle.handle_session_closed(&reason);
                self.apply_lifecycle(actions);
            },
        }
    }

    fn apply_lifecycle(&mut self, actions: Vec<LifecycleAction>) {
        for action in actions {
            match action {
                LifecycleAction::CreateSession { capacity } => {
                    self.adapter.create_session(capacity);
                },
                LifecycleAction::JoinSession { secret } => {
                    self.adapter.join_session(&secret);
                },
                LifecycleAction::ConnectNetwork { session_id } => {
                    self.adapter.connect_network(session_id);
                },
                LifecycleAction::OpenChannel { session_id, channel, reliable } => {
                    self.adapter.open_channel(session_id, channel, reliable);
                },
                LifecycleAction::ConnectVoice { session_id } => {
                    self.adapter.connect_voice(session_id);
                },
                LifecycleAction::PublishMetadata { session_id, secret, max_size } => {
                    let current = self.roster.len() as u32;
                    self.adapter.update_shared_metadata(session_id, &secret, current, max_size);
                },
                LifecycleAction::ResetRoster => {
                    for peer_id in self.roster.clear() {
                        self.notifications.push_back(Notification::PeerDisconnected(peer_id));
                    }
                    if let Some(local_id) = self.lifecycle.local_peer() {
                        self.admit_local_peer(local_id);
                    }
                },
                LifecycleAction::ClearRoster => {
                    for peer_id in self.roster.clear() {
                        self.notifications.push_back(Notification::PeerDisconnected(peer_id));
                    }
                },
                LifecycleAction::AdmitPeers { peers } => {
                    for peer_id in peers {
                        self.insert_peer(peer_id);
                    }
                },
                LifecycleAction::AnnounceIdentity => {
                    let actions = self.identity.announce();
                    self.apply_identity(actions);
                },
            }
        }
    }

    fn apply_identity(&mut self, actions: Vec<IdentityAction>) {
        if actions.is_empty() {
            return;
        }

        let Some(session_id) = self.lifecycle.session().map(|s| s.id) else {
            tracing::debug!("identity send without live session skipped");
            return;
        };

        for action in actions {
            match action {
                IdentityAction::Broadcast { payload } => {
                    self.adapter.broadcast_reliable(session_id, payload);
                },
                IdentityAction::Unicast { target, payload } => {
                    self.adapter.send_unreliable(session_id, target, IDENTITY_CHANNEL, payload);
                },
            }
        }
    }

    /// Insert a peer and emit its connect notification. Duplicate inserts
    /// are a backend bug: logged at error level, never propagated.
    fn insert_peer(&mut self, peer_id: PeerId) -> bool {
        match self.roster.insert(peer_id) {
            Ok(_) => {
                self.notifications.push_back(Notification::PeerConnected(peer_id));
                true
            },
            Err(error) => {
                tracing::error!(%error, "roster invariant violation");
                false
            },
        }
    }

    /// Insert the local peer and mirror any already-known identity into its
    /// roster entry.
    fn admit_local_peer(&mut self, peer_id: PeerId) {
        if !self.insert_peer(peer_id) {
            return;
        }

        if let Some(identity) = self.identity.local().map(str::to_owned)
            && self.roster.set_application_id(peer_id, &identity) == IdentityOutcome::Updated
        {
            self.notifications
                .push_back(Notification::IdentityUpdated { peer_id, application_id: identity });
        }
    }

    fn handle_identity_payload(&mut self, peer_id: PeerId, bytes: &[u8]) {
        match decode_identity(bytes) {
            Ok(text) => match self.roster.set_application_id(peer_id, text) {
                IdentityOutcome::Updated => {
                    self.notifications.push_back(Notification::IdentityUpdated {
                        peer_id,
                        application_id: text.to_owned(),
                    });
                },
                IdentityOutcome::Unchanged => {
                    tracing::debug!(peer_id, "identity unchanged");
                },
                IdentityOutcome::UnknownPeer => {
                    tracing::debug!(peer_id, "identity for unknown peer, likely raced disconnect");
                },
            },
            Err(error) => {
                tracing::warn!(peer_id, %error, "malformed identity payload dropped");
            },
        }
    }

    /// Re-publish shared metadata with the current roster size.
    fn refresh_metadata(&mut self) {
        let Some(session) = self.lifecycle.session() else {
            return;
        };

        let (session_id, secret, capacity) = (session.id, session.secret.clone(), session.capacity);
        let current = self.roster.len() as u32;
        self.adapter.update_shared_metadata(session_id, &secret, current, capacity);
    }

    fn update_volumes(&mut self) {
        let adapter = &mut self.adapter;
        attenuation::update_volumes(&self.roster, &self.attenuation, |peer_id, volume| {
            adapter.set_peer_volume(peer_id, volume);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use earshot_proto::SessionId;

    /// Backend that accepts every command and never produces events.
    #[derive(Default)]
    struct NullAdapter;

    impl SessionAdapter for NullAdapter {
        fn create_session(&mut self, _capacity: u32) {}
        fn join_session(&mut self, _secret: &str) {}
        fn connect_network(&mut self, _session_id: SessionId) {}
        fn open_channel(&mut self, _session_id: SessionId, _channel: u8, _reliable: bool) {}
        fn broadcast_reliable(&mut self, _session_id: SessionId, _bytes: Bytes) {}
        fn send_unreliable(
            &mut self,
            _session_id: SessionId,
            _target: PeerId,
            _channel: u8,
            _bytes: Bytes,
        ) {
        }
        fn set_peer_volume(&mut self, _peer_id: PeerId, _volume: u8) {}
        fn set_voice_muted(&mut self, _muted: bool) {}
        fn connect_voice(&mut self, _session_id: SessionId) {}
        fn update_shared_metadata(
            &mut self,
            _session_id: SessionId,
            _secret: &str,
            _current_size: u32,
            _max_size: u32,
        ) {
        }
        fn pump_events(&mut self) -> Vec<AdapterEvent> {
            Vec::new()
        }
    }

    #[test]
    fn degenerate_range_rejected_at_construction() {
        let config = SessionConfig { min_distance: 50.0, max_distance: 50.0, ..Default::default() };
        assert!(ProximitySession::new(NullAdapter, config).is_err());
    }

    #[test]
    fn tick_before_initialize_is_inert() {
        let mut session = ProximitySession::new(NullAdapter, SessionConfig::default()).unwrap();
        session.tick();
        assert_eq!(session.peer_count(), 0);
        assert_eq!(session.state(), LifecycleState::Idle);
    }

    #[test]
    fn identity_before_session_is_remembered() {
        let mut session = ProximitySession::new(NullAdapter, SessionConfig::default()).unwrap();
        session.initialize();
        session.set_local_application_id("Guide");

        // No roster entry yet, so no notification either.
        assert!(session.take_notifications().is_empty());
        assert_eq!(session.network_id("Guide"), None);
    }

    #[test]
    fn distance_setters_validate() {
        let mut session = ProximitySession::new(NullAdapter, SessionConfig::default()).unwrap();

        assert!(session.set_min_distance(200.0).is_err());
        assert!(session.set_max_distance(200.0).is_ok());
        assert_eq!(session.max_distance(), 200.0);
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut session = ProximitySession::new(NullAdapter, SessionConfig::default()).unwrap();
        session.initialize();
        session.dispose();
        session.dispose();
        assert_eq!(session.state(), LifecycleState::Idle);
    }
}
