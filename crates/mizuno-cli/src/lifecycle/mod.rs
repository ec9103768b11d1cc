//! Lifecycle management for the daemonised service.
//!
//! This module is split into focused submodules so each concern remains small and
//! testable:
//! - [`types`] defines the command model, outcomes, and IO helpers.
//! - [`error`] captures the error surface exposed to the CLI.
//! - [`pid`] reads, writes, and reconciles the pid file.
//! - [`process_table`] decides whether a recorded pid is still the service.
//! - [`lock`] serialises state-changing commands.
//! - [`spawning`] launches the detached child.
//! - [`signal`] delivers control signals.
//! - [`probe`] polls the service over HTTP to confirm startup and shutdown.
//! - [`controller`] implements the start/status/reload/stop/kill flows.

mod controller;
#[cfg(test)]
mod controller_tests;
mod error;
mod lock;
mod pid;
mod probe;
mod process_table;
mod signal;
mod spawning;
mod types;

pub(crate) use controller::SystemLifecycle;
pub(crate) use error::LifecycleError;
pub(crate) use types::{LifecycleCommand, LifecycleOutput, Report};

const LIFECYCLE_TARGET: &str = "mizuno::lifecycle";
