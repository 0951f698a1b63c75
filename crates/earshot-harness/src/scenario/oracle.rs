//! Oracle functions for scenario verification.
//!
//! Oracles run once at the end of a scenario and assert global
//! consistency over the final world state.

use earshot_core::lifecycle::LifecycleState;

use crate::scenario::World;

/// Oracle function type.
///
/// Receives the final world state and returns `Err(message)` if any
/// invariant is violated.
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;

/// Verify the lifecycle ended in the given state.
pub fn state_is(expected: LifecycleState) -> OracleFn {
    Box::new(move |world| {
        let actual = world.state();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected state {expected:?}, got {actual:?}"))
        }
    })
}

/// Verify the roster holds exactly this many peers, local included.
pub fn roster_size(expected: usize) -> OracleFn {
    Box::new(move |world| {
        let actual = world.session().peer_count();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected {expected} peers, got {actual}"))
        }
    })
}

/// Verify exactly this many create requests reached the backend.
pub fn create_requests(expected: usize) -> OracleFn {
    Box::new(move |world| {
        let actual = world.adapter().create_requests();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected {expected} create requests, got {actual}"))
        }
    })
}

/// Verify exactly this many join requests reached the backend.
pub fn join_requests(expected: usize) -> OracleFn {
    Box::new(move |world| {
        let actual = world.adapter().join_requests();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected {expected} join requests, got {actual}"))
        }
    })
}

/// Combine multiple oracles into one.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| {
        for oracle in oracles {
            oracle(world)?;
        }
        Ok(())
    })
}
