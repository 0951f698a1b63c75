//! Property-based tests for the Roster.
//!
//! These tests verify the two structural invariants against a simple model
//! for all event sequences:
//! - No two peers ever share a network id
//! - While non-empty, the local peer is the earliest surviving insert
//! - The application id index never dangles

use std::collections::HashSet;

use earshot_core::roster::{IdentityOutcome, Peer, Roster};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Connect(u64),
    Disconnect(u64),
    Identify(u64, String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..12).prop_map(Op::Connect),
        (0u64..12).prop_map(Op::Disconnect),
        ((0u64..12), "[a-d]{1,3}").prop_map(|(id, name)| Op::Identify(id, name)),
    ]
}

#[test]
fn prop_roster_matches_ordered_set_model() {
    proptest!(|(ops in prop::collection::vec(op_strategy(), 0..64))| {
        let mut roster = Roster::new();
        let mut model: Vec<u64> = Vec::new();

        for op in ops {
            match op {
                Op::Connect(id) => {
                    let inserted = roster.insert(id).is_ok();
                    let expected = !model.contains(&id);
                    prop_assert_eq!(inserted, expected, "insert outcome diverged for {}", id);
                    if inserted {
                        model.push(id);
                    }
                },
                Op::Disconnect(id) => {
                    let removed = roster.remove(id);
                    let expected = model.contains(&id);
                    prop_assert_eq!(removed, expected, "remove outcome diverged for {}", id);
                    model.retain(|&m| m != id);
                },
                Op::Identify(id, name) => {
                    let outcome = roster.set_application_id(id, &name);
                    if model.contains(&id) {
                        prop_assert_ne!(outcome, IdentityOutcome::UnknownPeer);
                    } else {
                        prop_assert_eq!(outcome, IdentityOutcome::UnknownPeer);
                    }
                },
            }

            // Uniqueness: no two peers share a network id.
            let ids: Vec<u64> = roster.iter().map(Peer::network_id).collect();
            let distinct: HashSet<u64> = ids.iter().copied().collect();
            prop_assert_eq!(ids.len(), distinct.len());

            // Order: the roster mirrors the model exactly, so index 0 is
            // always the earliest surviving insert.
            prop_assert_eq!(&ids, &model);
            prop_assert_eq!(roster.local_peer().map(Peer::network_id), model.first().copied());
            prop_assert_eq!(roster.len(), model.len());
        }
    });
}

#[test]
fn prop_identity_reapplication_is_idempotent() {
    proptest!(|(id in 0u64..32, name in "[a-z]{1,8}")| {
        let mut roster = Roster::new();
        roster.insert(id).unwrap();

        prop_assert_eq!(roster.set_application_id(id, &name), IdentityOutcome::Updated);
        prop_assert_eq!(roster.set_application_id(id, &name), IdentityOutcome::Unchanged);
        prop_assert_eq!(roster.find_by_application_id(&name).map(Peer::network_id), Some(id));
    });
}

#[test]
fn prop_application_index_never_dangles() {
    proptest!(|(ops in prop::collection::vec(op_strategy(), 0..48), probe in "[a-d]{1,3}")| {
        let mut roster = Roster::new();

        for op in ops {
            match op {
                Op::Connect(id) => {
                    let _ = roster.insert(id);
                },
                Op::Disconnect(id) => {
                    roster.remove(id);
                },
                Op::Identify(id, name) => {
                    roster.set_application_id(id, &name);
                },
            }

            // Whatever the lookup returns must actually be in the roster
            // and carry the probed id.
            if let Some(peer) = roster.find_by_application_id(&probe) {
                prop_assert_eq!(peer.application_id(), Some(probe.as_str()));
                prop_assert!(roster.find(peer.network_id()).is_some());
            }
        }
    });
}
