//! Persisted instance manifest.
//!
//! Written once at successful startup completion and read by `endpoint` and
//! `list` without touching any running process. Unknown keys are carried
//! through untouched so newer writers stay readable.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Gateway endpoint recorded for an instance started with a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyInfo {
    pub address: String,
}

/// Metadata record for one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyInfo>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Manifest {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            proxy: None,
            extra: BTreeMap::new(),
        }
    }

    /// Loads the manifest from `path`.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the manifest to `path`.
    pub fn store(&self, path: &Path) -> Result<(), ManifestError> {
        let content = serde_yaml::to_string(self).map_err(|source| ManifestError::Serialize {
            id: self.id.clone(),
            source,
        })?;
        fs::write(path, content).map_err(|source| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Errors raised while reading or writing the instance manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse manifest {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to serialize manifest for instance {id}: {source}")]
    Serialize {
        id: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to write manifest {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
