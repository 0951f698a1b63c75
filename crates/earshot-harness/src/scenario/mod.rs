//! Scenario framework for multi-tick session tests.
//!
//! A scenario scripts the backend, drives the facade through an ordered
//! list of steps, and finishes with a mandatory oracle that verifies
//! global consistency. Tests that skip verification do not compile: the
//! only way to obtain a runnable scenario is through
//! [`Scenario::oracle`](builder::Scenario::oracle).

pub mod builder;
pub mod oracle;
pub mod world;

pub use builder::{RunnableScenario, Scenario};
pub use oracle::OracleFn;
pub use world::World;
