//! Session lifecycle state machine.
//!
//! Drives the create-or-join flow against the transport backend. Like the
//! rest of the core this is an action-based state machine: methods consume
//! one pumped event, mutate local state, and return actions for the facade
//! to execute. No I/O happens here.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ identity ready ┌─────────────────┐ create ok ┌────────────────┐
//! │ Idle │───────────────>│ CreatingSession │──────────>│ OwnerConnected │
//! └──────┘                └─────────────────┘           └────────────────┘
//!    │                   create err │   ▲                        │
//!    │                   (retry)    └───┘                        │
//!    │ invitation                                                │
//!    ▼                                                           ▼
//! ┌────────────────┐ join ok ┌─────────────────┐  closed    ┌──────┐
//! │ JoiningSession │────────>│ MemberConnected │───────────>│ Idle │
//! └────────────────┘         └─────────────────┘  /teardown └──────┘
//! ```
//!
//! `OwnerConnected` and `MemberConnected` are the only stable states. An
//! invitation is honored from any state except while a join is already
//! outstanding (the join guard); winning a join abandons whatever session
//! was live before it.
//!
//! # Retry policy
//!
//! Session creation retries immediately and indefinitely on failure; there
//! is no other party who could create the session instead. An optional
//! attempt cap can bound this. Joins never retry: an invitation targets a
//! specific, possibly already-expired, secret.

use earshot_proto::{IDENTITY_CHANNEL, PeerId, SessionId};

use crate::{
    adapter::{JoinedSession, SessionHandle},
    error::TransportError,
};

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No session and no request in flight
    Idle,
    /// A create request is outstanding
    CreatingSession,
    /// A join request is outstanding (and no session was live before it)
    JoiningSession,
    /// Live session, created by us
    OwnerConnected,
    /// Live session, created by someone else
    MemberConnected,
}

impl LifecycleState {
    /// Whether a session is currently live.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::OwnerConnected | Self::MemberConnected)
    }
}

/// The current shared session context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Transport-assigned session id
    pub id: SessionId,
    /// Network id of the session's creator
    pub owner_id: PeerId,
    /// Maximum peer count
    pub capacity: u32,
    /// Invite secret for metadata publishing
    pub secret: String,
}

impl Session {
    fn from_handle(handle: SessionHandle) -> Self {
        Self {
            id: handle.id,
            owner_id: handle.owner_id,
            capacity: handle.capacity,
            secret: handle.secret,
        }
    }
}

/// Actions returned by the lifecycle machine for the facade to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Issue a create request to the backend
    CreateSession {
        /// Requested capacity
        capacity: u32,
    },

    /// Issue a join-by-secret request to the backend
    JoinSession {
        /// Invitation secret
        secret: String,
    },

    /// Connect to the session's message network
    ConnectNetwork {
        /// Target session
        session_id: SessionId,
    },

    /// Open a message channel
    OpenChannel {
        /// Target session
        session_id: SessionId,
        /// Channel number
        channel: u8,
        /// Reliable or best-effort delivery
        reliable: bool,
    },

    /// Request a voice connection
    ConnectVoice {
        /// Target session
        session_id: SessionId,
    },

    /// Publish session metadata for discovery. The facade fills in the
    /// current roster size at execution time.
    PublishMetadata {
        /// Target session
        session_id: SessionId,
        /// Invite secret
        secret: String,
        /// Maximum peer count
        max_size: u32,
    },

    /// Clear the roster and re-seed it with the local peer. Emitted when a
    /// new session replaces the current roster contents.
    ResetRoster,

    /// Drop every roster entry without re-seeding. Emitted on teardown.
    ClearRoster,

    /// Insert already-present session members into the roster (local peer
    /// excluded).
    AdmitPeers {
        /// Members to insert, in backend enumeration order
        peers: Vec<PeerId>,
    },

    /// Broadcast the local application identity, if one is set.
    AnnounceIdentity,
}

/// Join guard: alive between "join requested" and "join result received".
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingJoin {
    secret: String,
}

/// The session lifecycle state machine.
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
    session: Option<Session>,
    capacity: u32,
    pending_join: Option<PendingJoin>,
    local_peer: Option<PeerId>,
    create_attempts: u32,
    max_create_attempts: Option<u32>,
}

impl Lifecycle {
    /// Create a new machine in [`LifecycleState::Idle`].
    #[must_use]
    pub fn new(capacity: u32, max_create_attempts: Option<u32>) -> Self {
        Self {
            state: LifecycleState::Idle,
            session: None,
            capacity,
            pending_join: None,
            local_peer: None,
            create_attempts: 0,
            max_create_attempts,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The live session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The local peer's network id, once known.
    #[must_use]
    pub fn local_peer(&self) -> Option<PeerId> {
        self.local_peer
    }

    /// Whether a join request is outstanding.
    #[must_use]
    pub fn join_pending(&self) -> bool {
        self.pending_join.is_some()
    }

    /// Number of create requests issued so far.
    #[cfg(test)]
    pub(crate) fn create_attempts(&self) -> u32 {
        self.create_attempts
    }

    /// The backend resolved the local user: start the create path.
    ///
    /// Fires exactly once at startup in practice; a duplicate event is
    /// logged and dropped.
    pub fn handle_local_identity_ready(&mut self, peer_id: PeerId) -> Vec<LifecycleAction> {
        if self.local_peer.is_some() {
            tracing::warn!(peer_id, "duplicate local identity event dropped");
            return Vec::new();
        }

        self.local_peer = Some(peer_id);

        if self.state != LifecycleState::Idle {
            tracing::warn!(state = ?self.state, "local identity arrived outside Idle");
            return Vec::new();
        }

        self.state = LifecycleState::CreatingSession;
        self.create_attempts = 1;
        tracing::info!(peer_id, capacity = self.capacity, "creating session");

        vec![LifecycleAction::CreateSession { capacity: self.capacity }]
    }

    /// Handle the completion of a create request.
    pub fn handle_create_result(
        &mut self,
        result: Result<SessionHandle, TransportError>,
    ) -> Vec<LifecycleAction> {
        if self.state != LifecycleState::CreatingSession {
            tracing::warn!(state = ?self.state, "stale create result dropped");
            return Vec::new();
        }

        match result {
            Ok(handle) => {
                tracing::info!(
                    session_id = handle.id,
                    owner_id = handle.owner_id,
                    "session created"
                );
                self.state = LifecycleState::OwnerConnected;
                let session = Session::from_handle(handle);
                let actions = Self::open_session_actions(&session);
                self.session = Some(session);
                actions
            },
            Err(error) => {
                tracing::warn!(
                    attempt = self.create_attempts,
                    %error,
                    "session create failed"
                );

                if let Some(cap) = self.max_create_attempts
                    && self.create_attempts >= cap
                {
                    tracing::error!(attempts = self.create_attempts, "create attempt cap reached");
                    self.state = LifecycleState::Idle;
                    return Vec::new();
                }

                self.create_attempts += 1;
                vec![LifecycleAction::CreateSession { capacity: self.capacity }]
            },
        }
    }

    /// An external invitation arrived: start the join path unless one is
    /// already outstanding.
    pub fn handle_join_request(&mut self, secret: &str) -> Vec<LifecycleAction> {
        if self.pending_join.is_some() {
            tracing::warn!("join already pending, invitation dropped");
            return Vec::new();
        }

        if self.local_peer.is_none() {
            tracing::warn!("invitation before local identity, dropped");
            return Vec::new();
        }

        let pending = PendingJoin { secret: secret.to_owned() };
        let actions = vec![LifecycleAction::JoinSession { secret: pending.secret.clone() }];
        self.pending_join = Some(pending);

        if self.state == LifecycleState::Idle {
            self.state = LifecycleState::JoiningSession;
        }

        tracing::info!("joining session by invitation");
        actions
    }

    /// Handle the completion of a join request.
    pub fn handle_join_result(
        &mut self,
        result: Result<JoinedSession, TransportError>,
    ) -> Vec<LifecycleAction> {
        if self.pending_join.take().is_none() {
            tracing::warn!("join result without pending join dropped");
            return Vec::new();
        }

        match result {
            Ok(joined) => {
                if let Some(previous) = &self.session {
                    tracing::info!(session_id = previous.id, "abandoning current session");
                }

                tracing::info!(
                    session_id = joined.handle.id,
                    members = joined.members.len(),
                    "joined session"
                );

                self.state = LifecycleState::MemberConnected;
                let session = Session::from_handle(joined.handle);

                let others: Vec<PeerId> = joined
                    .members
                    .into_iter()
                    .filter(|&id| Some(id) != self.local_peer)
                    .collect();

                let mut actions = vec![LifecycleAction::ResetRoster];
                actions.extend(Self::open_session_actions(&session));
                actions.push(LifecycleAction::AdmitPeers { peers: others });
                actions.push(LifecycleAction::AnnounceIdentity);
                actions.push(LifecycleAction::PublishMetadata {
                    session_id: session.id,
                    secret: session.secret.clone(),
                    max_size: session.capacity,
                });

                self.session = Some(session);
                actions
            },
            Err(error) => {
                tracing::warn!(%error, "join failed, waiting for a new invitation");
                if self.state == LifecycleState::JoiningSession {
                    self.state = LifecycleState::Idle;
                }
                Vec::new()
            },
        }
    }

    /// Change the configured capacity.
    ///
    /// Forwarded to the backend's metadata mechanism when a session is
    /// live; otherwise only remembered for the next create.
    pub fn set_capacity(&mut self, capacity: u32) -> Vec<LifecycleAction> {
        self.capacity = capacity;

        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        session.capacity = capacity;
        vec![LifecycleAction::PublishMetadata {
            session_id: session.id,
            secret: session.secret.clone(),
            max_size: capacity,
        }]
    }

    /// The backend reported a terminal disconnect.
    pub fn handle_session_closed(&mut self, reason: &str) -> Vec<LifecycleAction> {
        if self.state == LifecycleState::Idle && self.session.is_none() {
            tracing::debug!(reason, "session closed while idle");
            return Vec::new();
        }

        tracing::info!(reason, "session closed");
        self.state = LifecycleState::Idle;
        self.session = None;
        self.pending_join = None;

        vec![LifecycleAction::ResetRoster]
    }

    /// Explicit teardown from the host.
    pub fn teardown(&mut self) -> Vec<LifecycleAction> {
        self.state = LifecycleState::Idle;
        self.session = None;
        self.pending_join = None;
        self.local_peer = None;
        self.create_attempts = 0;

        vec![LifecycleAction::ClearRoster]
    }

    /// The channel/voice/metadata bring-up shared by both connect paths.
    fn open_session_actions(session: &Session) -> Vec<LifecycleAction> {
        vec![
            LifecycleAction::ConnectNetwork { session_id: session.id },
            LifecycleAction::OpenChannel {
                session_id: session.id,
                channel: IDENTITY_CHANNEL,
                reliable: false,
            },
            LifecycleAction::ConnectVoice { session_id: session.id },
            LifecycleAction::PublishMetadata {
                session_id: session.id,
                secret: session.secret.clone(),
                max_size: session.capacity,
            },
        ]
    }
}
