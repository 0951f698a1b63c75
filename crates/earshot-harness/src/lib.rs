//! Deterministic simulation harness for Earshot session testing.
//!
//! This crate provides a scripted [`SessionAdapter`] implementation and a
//! scenario framework for driving the session facade through multi-tick
//! event sequences with mandatory oracle verification.
//!
//! [`SessionAdapter`]: earshot_core::adapter::SessionAdapter

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod scenario;
pub mod sim_adapter;

pub use sim_adapter::{Command, SimAdapter};
