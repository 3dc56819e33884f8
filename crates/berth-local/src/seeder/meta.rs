//! Sidecar `.meta` documents describing local content tree entries.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::client::AttrValue;

/// Parsed sidecar document.
///
/// Files require `type` and `format`; directories only carry attributes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeMeta {
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub format: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

/// Why a sidecar could not be used; each case degrades to a per-item skip.
#[derive(Debug)]
pub enum MetaIssue {
    Missing,
    Unreadable(io::Error),
    Unparsable(serde_yaml::Error),
}

/// Loads the sidecar for the entry at `path` (`<path>.meta`).
pub fn load_sidecar(path: &Path) -> Result<NodeMeta, MetaIssue> {
    let sidecar = sidecar_path(path);
    if !sidecar.is_file() {
        return Err(MetaIssue::Missing);
    }
    let content = fs::read_to_string(&sidecar).map_err(MetaIssue::Unreadable)?;
    serde_yaml::from_str(&content).map_err(MetaIssue::Unparsable)
}

/// Attributes for a directory: taken from the `.meta` file inside it, when
/// present and well-formed; anything else yields no attributes.
pub fn directory_attributes(dir: &Path) -> BTreeMap<String, AttrValue> {
    let meta_path = dir.join(".meta");
    if !meta_path.is_file() {
        return BTreeMap::new();
    }
    let Ok(content) = fs::read_to_string(&meta_path) else {
        return BTreeMap::new();
    };
    match serde_yaml::from_str::<NodeMeta>(&content) {
        Ok(meta) => meta.attributes,
        Err(error) => {
            tracing::warn!(
                target: super::SEEDER_TARGET,
                path = %meta_path.display(),
                error = %error,
                "failed to load directory meta, attributes will not be processed"
            );
            BTreeMap::new()
        }
    }
}

pub fn sidecar_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".meta");
    std::path::PathBuf::from(name)
}

/// True for sidecar files themselves, which never map to namespace nodes.
pub fn is_sidecar(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == "meta")
}
