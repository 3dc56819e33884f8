//! Instance lifecycle management.
//!
//! Split into focused submodules so each concern remains small and
//! testable:
//! - [`types`] defines the request and result models.
//! - [`error`] captures the error surface of every operation.
//! - [`registry`] persists the durable pid ledger.
//! - [`probe`] handles liveness probing and forceful termination.
//! - [`lock`] serialises concurrent starts on one sandbox.
//! - [`ports`] assigns ports, coordinating parallel runs via port locks.
//! - [`spawning`] resolves binaries and spawns role processes.
//! - [`controller`] implements the start/stop/delete/endpoint/list flows.

mod controller;
mod error;
mod lock;
mod ports;
mod probe;
mod registry;
mod spawning;
mod types;

pub use controller::LocalCluster;
pub use error::LifecycleError;
pub use types::{
    InstanceHandle, InstanceStatus, InstanceSummary, RoleBinaries, StartOptions,
};
