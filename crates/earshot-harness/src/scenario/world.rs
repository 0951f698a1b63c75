//! World state for scenario execution.
//!
//! The World owns the session facade under test and accumulates every
//! notification it emits, so oracles can assert on the full history rather
//! than whatever happened to be undrained at the end.

use earshot_core::{
    Notification, ProximitySession, SessionConfig,
    lifecycle::LifecycleState,
};
use earshot_proto::PeerId;

use crate::sim_adapter::SimAdapter;

/// World state: the facade under test plus its notification history.
pub struct World {
    session: ProximitySession<SimAdapter>,
    notifications: Vec<Notification>,
}

impl World {
    /// Create a world around an initialized session.
    ///
    /// Panics on a degenerate distance configuration; scenario configs are
    /// test inputs, not runtime data.
    #[must_use]
    pub fn new(adapter: SimAdapter, config: SessionConfig) -> Self {
        let mut session =
            ProximitySession::new(adapter, config).expect("scenario config must be valid");
        session.initialize();
        Self { session, notifications: Vec::new() }
    }

    /// Run one tick and capture the notifications it produced.
    pub fn tick(&mut self) {
        self.session.tick();
        self.notifications.extend(self.session.take_notifications());
    }

    /// Run several ticks.
    pub fn tick_n(&mut self, count: u32) {
        for _ in 0..count {
            self.tick();
        }
    }

    /// The facade under test.
    #[must_use]
    pub fn session(&self) -> &ProximitySession<SimAdapter> {
        &self.session
    }

    /// The facade under test, mutably (for host-side steps).
    pub fn session_mut(&mut self) -> &mut ProximitySession<SimAdapter> {
        &mut self.session
    }

    /// The scripted backend.
    #[must_use]
    pub fn adapter(&self) -> &SimAdapter {
        self.session.adapter()
    }

    /// The scripted backend, mutably (for delivering events).
    pub fn adapter_mut(&mut self) -> &mut SimAdapter {
        self.session.adapter_mut()
    }

    /// Every notification emitted so far, in pump order.
    #[must_use]
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Number of `PeerConnected` notifications for a specific peer.
    #[must_use]
    pub fn connects_of(&self, peer_id: PeerId) -> usize {
        self.notifications
            .iter()
            .filter(|n| matches!(n, Notification::PeerConnected(id) if *id == peer_id))
            .count()
    }

    /// Number of `PeerDisconnected` notifications for a specific peer.
    #[must_use]
    pub fn disconnects_of(&self, peer_id: PeerId) -> usize {
        self.notifications
            .iter()
            .filter(|n| matches!(n, Notification::PeerDisconnected(id) if *id == peer_id))
            .count()
    }

    /// Number of `IdentityUpdated` notifications for a specific peer.
    #[must_use]
    pub fn identity_updates_of(&self, peer_id: PeerId) -> usize {
        self.notifications
            .iter()
            .filter(|n| matches!(n, Notification::IdentityUpdated { peer_id: id, .. } if *id == peer_id))
            .count()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.session.state()
    }
}
