//! Session lifecycle integration tests.
//!
//! Drives the full facade over the scripted backend:
//! - create path (including retry-until-success and the attempt cap)
//! - join path (guard, failure, member enumeration, session switch)
//! - terminal disconnect and teardown

use earshot_core::{SessionConfig, lifecycle::LifecycleState};
use earshot_harness::{
    Command, SimAdapter,
    scenario::{Scenario, World, oracle},
};

const LOCAL: u64 = 100;

fn fresh_world(adapter: SimAdapter) -> World {
    World::new(adapter, SessionConfig::default())
}

/// World that has already completed the create path.
fn owner_world() -> World {
    let mut adapter = SimAdapter::new();
    adapter.announce_local_identity(LOCAL, "local-user");
    let mut world = fresh_world(adapter);
    world.tick_n(2);
    assert_eq!(world.state(), LifecycleState::OwnerConnected);
    world
}

#[test]
fn create_path_reaches_owner_connected() {
    let mut adapter = SimAdapter::new();
    adapter.announce_local_identity(LOCAL, "local-user");
    let mut world = fresh_world(adapter);

    // Tick 1: local user resolves, create request goes out.
    world.tick();
    assert_eq!(world.state(), LifecycleState::CreatingSession);
    assert_eq!(world.session().peer_count(), 1);
    assert_eq!(world.session().peer_network_id_at(0), Some(LOCAL));

    // Tick 2: create completes, session is live.
    world.tick();
    assert_eq!(world.state(), LifecycleState::OwnerConnected);
    let session = world.session().session().expect("session must be live");
    assert_eq!(session.owner_id, LOCAL);

    // Bring-up reached the backend: network, channel, voice, metadata.
    let commands = world.adapter().commands();
    assert!(commands.iter().any(|c| matches!(c, Command::ConnectNetwork { .. })));
    assert!(commands.iter().any(|c| matches!(
        c,
        Command::OpenChannel { channel: 0, reliable: false, .. }
    )));
    assert!(commands.iter().any(|c| matches!(c, Command::ConnectVoice { .. })));
    assert!(commands.iter().any(|c| matches!(
        c,
        Command::UpdateSharedMetadata { current_size: 1, max_size: 4, .. }
    )));

    // The local microphone was unmuted at startup.
    assert!(commands.iter().any(|c| matches!(c, Command::SetVoiceMuted { muted: false })));
}

#[test]
fn create_fails_twice_then_succeeds() {
    Scenario::new()
        .failing_creates(2)
        .with_local_user(LOCAL, "local-user")
        .tick(4)
        .oracle(oracle::all_of(vec![
            oracle::state_is(LifecycleState::OwnerConnected),
            oracle::create_requests(3),
        ]))
        .run()
        .expect("create must eventually succeed");
}

#[test]
fn create_attempt_cap_gives_up() {
    let config = SessionConfig { max_create_attempts: Some(3), ..Default::default() };

    Scenario::new()
        .with_config(config)
        .failing_creates(10)
        .with_local_user(LOCAL, "local-user")
        .tick(8)
        .oracle(oracle::all_of(vec![
            oracle::state_is(LifecycleState::Idle),
            oracle::create_requests(3),
        ]))
        .run()
        .expect("capped create must stop retrying");
}

#[test]
fn back_to_back_invitations_issue_single_join() {
    let mut world = owner_world();

    world.adapter_mut().deliver_invitation("friend-secret");
    world.adapter_mut().deliver_invitation("friend-secret");
    world.tick();

    assert_eq!(world.adapter().join_requests(), 1);
}

#[test]
fn join_failure_waits_for_new_invitation() {
    let mut world = owner_world();
    world.adapter_mut().reject_join("invitation expired");

    world.adapter_mut().deliver_invitation("stale-secret");
    world.tick_n(2);

    // Still in the owned session, guard cleared.
    assert_eq!(world.state(), LifecycleState::OwnerConnected);

    // A fresh invitation goes through the guard again.
    world.adapter_mut().script_join(500, 8, vec![500, LOCAL]);
    world.adapter_mut().deliver_invitation("fresh-secret");
    world.tick_n(2);

    assert_eq!(world.adapter().join_requests(), 2);
    assert_eq!(world.state(), LifecycleState::MemberConnected);
}

#[test]
fn join_enumerates_members_local_first() {
    let mut world = owner_world();
    world.adapter_mut().script_join(500, 8, vec![500, LOCAL, 600]);

    world.adapter_mut().deliver_invitation("friend-secret");
    world.tick_n(2);

    assert_eq!(world.state(), LifecycleState::MemberConnected);
    let session = world.session().session().expect("joined session");
    assert_eq!(session.owner_id, 500);
    assert_eq!(session.capacity, 8);

    // Local peer keeps index 0; enumerated members follow, local skipped.
    assert_eq!(world.session().peer_count(), 3);
    assert_eq!(world.session().peer_network_id_at(0), Some(LOCAL));
    assert_eq!(world.session().peer_network_id_at(1), Some(500));
    assert_eq!(world.session().peer_network_id_at(2), Some(600));
}

#[test]
fn join_broadcasts_identity_when_already_set() {
    let mut adapter = SimAdapter::new();
    adapter.announce_local_identity(LOCAL, "local-user");
    adapter.script_join(500, 8, vec![500, LOCAL]);
    let mut world = fresh_world(adapter);
    world.session_mut().set_local_application_id("Ruth");
    world.tick_n(2);

    world.adapter_mut().deliver_invitation("friend-secret");
    world.tick_n(2);

    let broadcasts = world.adapter().broadcasts();
    assert!(
        broadcasts.iter().any(|b| b.as_ref() == b"Ruth"),
        "expected identity broadcast after join, got {broadcasts:?}"
    );
}

#[test]
fn join_without_identity_broadcasts_nothing() {
    let mut world = owner_world();
    world.adapter_mut().script_join(500, 8, vec![500, LOCAL]);

    world.adapter_mut().deliver_invitation("friend-secret");
    world.tick_n(2);

    assert!(world.adapter().broadcasts().is_empty());
}

#[test]
fn capacity_change_forwarded_while_live() {
    let mut world = owner_world();

    world.session_mut().set_capacity(16);
    let last_metadata = world
        .adapter()
        .commands()
        .iter()
        .rev()
        .find_map(|c| match c {
            Command::UpdateSharedMetadata { current_size, max_size, .. } => {
                Some((*current_size, *max_size))
            },
            _ => None,
        })
        .expect("capacity change must publish metadata");

    assert_eq!(last_metadata, (1, 16));
}

#[test]
fn peer_churn_refreshes_metadata() {
    let mut world = owner_world();

    world.adapter_mut().connect_peer(600);
    world.tick();

    let sizes: Vec<u32> = world
        .adapter()
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::UpdateSharedMetadata { current_size, .. } => Some(*current_size),
            _ => None,
        })
        .collect();
    assert_eq!(sizes.last(), Some(&2));

    world.adapter_mut().disconnect_peer(600);
    world.tick();

    let sizes: Vec<u32> = world
        .adapter()
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::UpdateSharedMetadata { current_size, .. } => Some(*current_size),
            _ => None,
        })
        .collect();
    assert_eq!(sizes.last(), Some(&1));
}

#[test]
fn session_closed_returns_to_idle() {
    let mut world = owner_world();
    world.adapter_mut().connect_peer(600);
    world.tick();

    world.adapter_mut().close_session("backend shutdown");
    world.tick();

    assert_eq!(world.state(), LifecycleState::Idle);
    assert!(world.session().session().is_none());

    // Roster is re-seeded with the local peer only.
    assert_eq!(world.session().peer_count(), 1);
    assert_eq!(world.session().peer_network_id_at(0), Some(LOCAL));
    assert_eq!(world.disconnects_of(600), 1);
}

#[test]
fn dispose_emits_disconnect_for_every_insert() {
    let mut world = owner_world();
    world.adapter_mut().connect_peer(600);
    world.adapter_mut().connect_peer(700);
    world.tick();

    world.session_mut().dispose();
    let notifications = world.session_mut().take_notifications();

    assert_eq!(world.session().peer_count(), 0);
    for peer in [LOCAL, 600, 700] {
        let count = notifications
            .iter()
            .filter(|n| matches!(n, earshot_core::Notification::PeerDisconnected(id) if *id == peer))
            .count();
        assert_eq!(count, 1, "peer {peer} must get exactly one disconnect");
    }
}

#[test]
fn duplicate_connect_is_logged_not_fatal() {
    let mut world = owner_world();

    world.adapter_mut().connect_peer(600);
    world.tick();
    world.adapter_mut().connect_peer(600);
    world.tick();

    // Still exactly one roster entry and one notification.
    assert_eq!(world.session().peer_count(), 2);
    assert_eq!(world.connects_of(600), 1);
}
