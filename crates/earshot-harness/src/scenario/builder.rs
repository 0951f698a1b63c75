//! Scenario builder API.
//!
//! Provides a declarative API for constructing session tests that enforce
//! the oracle pattern: script the backend, list the steps, verify at the
//! end.

use earshot_core::{SessionConfig, adapter::AdapterEvent};
use earshot_proto::PeerId;

use crate::{
    scenario::{OracleFn, World},
    sim_adapter::SimAdapter,
};

/// One step of a scenario, executed in order.
enum Step {
    /// Queue a backend event for the next pump
    Deliver(AdapterEvent),
    /// Run this many ticks
    Tick(u32),
    /// Host sets the local application identity
    SetLocalApplicationId(String),
    /// Host reports a peer position
    SetPeerPosition(PeerId, f32, f32, f32),
    /// Host changes the capacity
    SetCapacity(u32),
    /// Host tears the session down
    Dispose,
}

/// Scenario builder.
///
/// Construct a scenario by scripting the backend, queueing steps, and
/// finishing with [`Scenario::oracle`].
pub struct Scenario {
    config: SessionConfig,
    seed: u64,
    create_failures: u32,
    join_script: Option<(PeerId, u32, Vec<PeerId>)>,
    local_identity_ready: Option<(PeerId, String)>,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a scenario with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            seed: 0,
            create_failures: 0,
            join_script: None,
            local_identity_ready: None,
            steps: Vec::new(),
        }
    }

    /// Use a specific session configuration.
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a specific backend RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fail the first `count` create requests.
    #[must_use]
    pub fn failing_creates(mut self, count: u32) -> Self {
        self.create_failures = count;
        self
    }

    /// Accept join requests with this session shape (member list should
    /// include the local peer).
    #[must_use]
    pub fn accepting_joins(mut self, owner: PeerId, capacity: u32, members: Vec<PeerId>) -> Self {
        self.join_script = Some((owner, capacity, members));
        self
    }

    /// Resolve the local user before the first tick.
    #[must_use]
    pub fn with_local_user(mut self, peer_id: PeerId, display_name: &str) -> Self {
        self.local_identity_ready = Some((peer_id, display_name.to_owned()));
        self
    }

    /// Queue a backend event.
    #[must_use]
    pub fn deliver(mut self, event: AdapterEvent) -> Self {
        self.steps.push(Step::Deliver(event));
        self
    }

    /// Run `count` ticks.
    #[must_use]
    pub fn tick(mut self, count: u32) -> Self {
        self.steps.push(Step::Tick(count));
        self
    }

    /// Host step: set the local application identity.
    #[must_use]
    pub fn set_local_application_id(mut self, identity: &str) -> Self {
        self.steps.push(Step::SetLocalApplicationId(identity.to_owned()));
        self
    }

    /// Host step: report a peer position.
    #[must_use]
    pub fn set_peer_position(mut self, peer_id: PeerId, x: f32, y: f32, z: f32) -> Self {
        self.steps.push(Step::SetPeerPosition(peer_id, x, y, z));
        self
    }

    /// Host step: change the capacity.
    #[must_use]
    pub fn set_capacity(mut self, capacity: u32) -> Self {
        self.steps.push(Step::SetCapacity(capacity));
        self
    }

    /// Host step: tear the session down.
    #[must_use]
    pub fn dispose(mut self) -> Self {
        self.steps.push(Step::Dispose);
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory: a scenario cannot run without verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario and run the oracle over the final world.
    ///
    /// # Errors
    ///
    /// Returns the oracle's message if verification fails.
    pub fn run(self) -> Result<(), String> {
        let mut adapter = SimAdapter::with_seed(self.scenario.seed);
        adapter.fail_next_creates(self.scenario.create_failures);

        if let Some((owner, capacity, members)) = self.scenario.join_script {
            adapter.script_join(owner, capacity, members);
        }

        if let Some((peer_id, display_name)) = self.scenario.local_identity_ready {
            adapter.announce_local_identity(peer_id, display_name);
        }

        let mut world = World::new(adapter, self.scenario.config);

        for step in self.scenario.steps {
            match step {
                Step::Deliver(event) => world.adapter_mut().push_event(event),
                Step::Tick(count) => world.tick_n(count),
                Step::SetLocalApplicationId(identity) => {
                    world.session_mut().set_local_application_id(identity);
                },
                Step::SetPeerPosition(peer_id, x, y, z) => {
                    world.session_mut().set_peer_position(peer_id, x, y, z);
                },
                Step::SetCapacity(capacity) => world.session_mut().set_capacity(capacity),
                Step::Dispose => world.session_mut().dispose(),
            }
        }

        (self.oracle)(&world)
    }
}

#[cfg(test)]
mod tests {
    use earshot_core::lifecycle::LifecycleState;

    use super::*;
    use crate::scenario::oracle;

    #[test]
    fn scenario_requires_oracle() {
        // This should compile - oracle provided
        let _scenario = Scenario::new().oracle(Box::new(|_world| Ok(())));
    }

    #[test]
    fn scenario_runs_create_path() {
        Scenario::new()
            .with_local_user(100, "local")
            .tick(2)
            .oracle(oracle::all_of(vec![
                oracle::state_is(LifecycleState::OwnerConnected),
                oracle::roster_size(1),
                oracle::create_requests(1),
            ]))
            .run()
            .expect("scenario should succeed");
    }
}
