//! Error surface of the lifecycle controller.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use berth_config::{ConfigError, LayoutError, ManifestError};

use crate::client::ClientError;
use berth_config::RoleKind;

/// Errors raised while executing lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot start a local instance without masters")]
    NoMasters,
    #[error(transparent)]
    InvalidId(#[from] LayoutError),
    #[error("instance {id} is already running")]
    AlreadyRunning { id: String },
    #[error("instance {id} not found")]
    NotFound { id: String },
    #[error("instance {id} is already stopped")]
    AlreadyStopped { id: String },
    #[error("instance {id} is not stopped")]
    NotStopped { id: String },
    #[error("failed to read pid ledger {path:?}: {source}")]
    LedgerUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse pid ledger {path:?}: {source}")]
    LedgerParse {
        path: PathBuf,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to write pid ledger {path:?}: {source}")]
    LedgerWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("manifest for instance {id} not found at {path:?}")]
    ManifestMissing { id: String, path: PathBuf },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("instance {id} does not have a started gateway proxy")]
    NoGateway { id: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to prepare sandbox directory {path:?}: {source}")]
    Sandbox {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to lock sandbox {path:?}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[cfg(unix)]
    #[error("failed to probe liveness of pid {pid}: {source}")]
    ProbeFailed {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },
    #[cfg(unix)]
    #[error("failed to signal process group of pid {pid}: {source}")]
    SignalFailed {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },
    #[error("failed to spawn {role} process from binary {binary:?}: {source}")]
    SpawnFailed {
        role: RoleKind,
        binary: OsString,
        #[source]
        source: io::Error,
    },
    #[error("no free port found for {role} starting at {start}")]
    PortsExhausted { role: RoleKind, start: u16 },
    #[error("failed to probe for a free port: {source}")]
    PortProbe {
        #[source]
        source: io::Error,
    },
    #[error("failed to encode config {path:?}: {message}")]
    ConfigEncode { path: PathBuf, message: String },
    #[error("failed to write config {path:?}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to enumerate instances root {path:?}: {source}")]
    ListRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("local content directory {path:?} does not exist")]
    ContentTreeMissing { path: PathBuf },
    #[error("failed to read local content entry {path:?}: {source}")]
    ContentRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[cfg(not(unix))]
    #[error("platform does not support local instance process supervision")]
    UnsupportedPlatform,
}
