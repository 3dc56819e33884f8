//! Maps an instance id and root path to its on-disk sandbox layout.
//!
//! Every lifecycle operation re-derives state from this layout: the pid
//! ledger is the sole authoritative "running" signal, the manifest is the
//! metadata record readable without any live process, and the lock file
//! serialises concurrent `start` attempts for the same id.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::roles::RoleKind;

/// Name of the pid ledger inside an instance sandbox.
pub const LEDGER_FILE: &str = "pids.txt";
/// Name of the manifest inside an instance sandbox.
pub const MANIFEST_FILE: &str = "info.yaml";
/// Name of the advisory lock file inside an instance sandbox.
pub const LOCK_FILE: &str = "local.lock";

/// Errors raised while validating instance identifiers.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("instance id must not be empty")]
    EmptyId,
    #[error("instance id {id:?} must not contain a path separator")]
    SeparatorInId { id: String },
}

/// Validates an instance id before any filesystem side effect.
pub fn validate_instance_id(id: &str) -> Result<(), LayoutError> {
    if id.is_empty() {
        return Err(LayoutError::EmptyId);
    }
    if id.contains('/') || id.contains(std::path::MAIN_SEPARATOR) {
        return Err(LayoutError::SeparatorInId { id: id.to_owned() });
    }
    Ok(())
}

/// Deterministic sandbox layout for one instance.
#[derive(Debug, Clone)]
pub struct InstancePaths {
    id: String,
    sandbox: PathBuf,
}

impl InstancePaths {
    /// Derives the layout for `id` under `root`.
    pub fn new(root: &Path, id: &str) -> Result<Self, LayoutError> {
        validate_instance_id(id)?;
        Ok(Self {
            id: id.to_owned(),
            sandbox: root.join(id),
        })
    }

    /// Instance identifier this layout belongs to.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sandbox directory holding every instance artefact.
    #[must_use]
    pub fn sandbox(&self) -> &Path {
        &self.sandbox
    }

    /// Path of the pid ledger.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.sandbox.join(LEDGER_FILE)
    }

    /// Path of the instance manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.sandbox.join(MANIFEST_FILE)
    }

    /// Path of the advisory start lock.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.sandbox.join(LOCK_FILE)
    }

    /// Working directory of the `index`-th process of `kind`.
    #[must_use]
    pub fn role_dir(&self, kind: RoleKind, index: u32) -> PathBuf {
        self.sandbox.join(format!("{kind}-{index}"))
    }

    /// Config file location for the `index`-th process of `kind`.
    #[must_use]
    pub fn role_config_path(&self, kind: RoleKind, index: u32) -> PathBuf {
        let extension = match kind {
            RoleKind::Proxy => "json",
            _ => "yaml",
        };
        self.role_dir(kind, index).join(format!("config.{extension}"))
    }
}
