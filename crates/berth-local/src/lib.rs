//! Lifecycle manager for self-contained local cluster instances.
//!
//! Starts, tracks, stops, and deletes local deployments composed of the
//! master, scheduler, node, and proxy server roles. Instance state is
//! derived entirely from an on-disk sandbox: the pid ledger is the sole
//! "running" signal, the manifest records metadata such as the gateway
//! endpoint, and a crashed prior run for an id is reclaimed automatically
//! by the next `start`.
//!
//! The actual server binaries, the namespace client library, and the
//! baseline world bootstrap are external collaborators injected through
//! the seams in [`client`].

pub mod client;
pub mod lifecycle;
pub mod seeder;
pub mod testing;
pub mod world;

pub use client::{AttrValue, ClientError, ClusterClient, Connect, ConnectTarget, WorldBootstrap};
pub use lifecycle::{
    InstanceHandle, InstanceStatus, InstanceSummary, LifecycleError, LocalCluster, RoleBinaries,
    StartOptions,
};
pub use seeder::seed_namespace;
pub use world::{initialize_world, local_fqdn};
