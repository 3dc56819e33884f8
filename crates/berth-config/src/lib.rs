//! Shared configuration model for local berth clusters.
//!
//! This crate is the pure data layer underneath the lifecycle controller:
//! role definitions and their base configuration documents, the overlay
//! codecs that deep-merge user-supplied override files, the on-disk layout
//! of an instance sandbox, the persisted instance manifest, and the
//! environment-sourced defaults resolved once at the outermost entry point.

mod env;
mod layout;
mod manifest;
mod overlay;
mod roles;

pub use env::LocalDefaults;
pub use layout::{
    InstancePaths, LEDGER_FILE, LOCK_FILE, LayoutError, MANIFEST_FILE, validate_instance_id,
};
pub use manifest::{Manifest, ManifestError, ProxyInfo};
pub use overlay::{ConfigError, OverlayFormat, deep_merge, load_document, merge_from_file};
pub use roles::{
    RoleCounts, RoleKind, RolePorts, node_base_config, proxy_base_config, server_base_config,
};
