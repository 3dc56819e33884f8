//! Config overlay codecs and the deep-merge routine.
//!
//! Two codecs exist, selected by an explicit format tag and never inferred
//! from file content: the structured YAML format used by server roles and
//! sidecar documents, and the flat JSON format consumed by the gateway
//! proxy. The flat codec transcodes into the YAML value model so both merge
//! through the same routine.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;

/// Serialization format of an override document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayFormat {
    /// Structured document used by master, scheduler, and node configs.
    Structured,
    /// Flat document used by the gateway proxy config.
    Flat,
}

/// Errors raised while loading or merging configuration overrides.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config override {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse structured config override {path:?}: {source}")]
    ParseStructured {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to parse flat config override {path:?}: {source}")]
    ParseFlat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to transcode flat config override {path:?}: {source}")]
    Transcode {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Loads an override document in the given format.
pub fn load_document(path: &Path, format: OverlayFormat) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    match format {
        OverlayFormat::Structured => {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::ParseStructured {
                path: path.to_path_buf(),
                source,
            })
        }
        OverlayFormat::Flat => {
            let json: serde_json::Value =
                serde_json::from_str(&content).map_err(|source| ConfigError::ParseFlat {
                    path: path.to_path_buf(),
                    source,
                })?;
            serde_yaml::to_value(json).map_err(|source| ConfigError::Transcode {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

/// Deep-merges `overlay` into `base` in place.
///
/// Mappings merge key by key, recursively; every other value kind replaces
/// the base value wholesale.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

/// Merges the override file at `path`, if any, into `base`.
///
/// An absent path leaves `base` untouched; a supplied but unreadable or
/// malformed file surfaces as a [`ConfigError`].
pub fn merge_from_file(
    base: &mut Value,
    path: Option<&Path>,
    format: OverlayFormat,
) -> Result<(), ConfigError> {
    let Some(path) = path else {
        return Ok(());
    };
    let overlay = load_document(path, format)?;
    deep_merge(base, overlay);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).expect("valid yaml literal")
    }

    #[test]
    fn deep_merge_combines_nested_mappings() {
        let mut base = yaml("logging:\n  level: info\n  directory: /tmp\nrpc_port: 20100\n");
        let overlay = yaml("logging:\n  level: debug\nextra: 1\n");
        deep_merge(&mut base, overlay);
        assert_eq!(base["logging"]["level"], Value::from("debug"));
        assert_eq!(base["logging"]["directory"], Value::from("/tmp"));
        assert_eq!(base["rpc_port"], Value::from(20100));
        assert_eq!(base["extra"], Value::from(1));
    }

    #[test]
    fn deep_merge_replaces_non_mapping_values() {
        let mut base = yaml("addresses: [a, b]\n");
        deep_merge(&mut base, yaml("addresses: [c]\n"));
        assert_eq!(base["addresses"], yaml("[c]"));
    }

    #[test]
    fn merge_from_file_without_path_is_a_no_op() {
        let mut base = yaml("rpc_port: 20100\n");
        let before = base.clone();
        merge_from_file(&mut base, None, OverlayFormat::Structured).expect("no-op merge");
        assert_eq!(base, before);
    }

    #[test]
    fn merge_from_file_applies_structured_override() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("master.yaml");
        fs::write(&path, "logging:\n  level: trace\n").expect("write override");
        let mut base = yaml("logging:\n  level: info\n");
        merge_from_file(&mut base, Some(&path), OverlayFormat::Structured).expect("merge");
        assert_eq!(base["logging"]["level"], Value::from("trace"));
    }

    #[test]
    fn merge_from_file_applies_flat_override() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("proxy.json");
        fs::write(&path, "{\"port\": 9999}").expect("write override");
        let mut base = yaml("port: 8080\naddress: localhost\n");
        merge_from_file(&mut base, Some(&path), OverlayFormat::Flat).expect("merge");
        assert_eq!(base["port"], Value::from(9999));
        assert_eq!(base["address"], Value::from("localhost"));
    }

    #[rstest]
    #[case(OverlayFormat::Structured, "{not yaml: [")]
    #[case(OverlayFormat::Flat, "not json at all")]
    fn malformed_override_surfaces_parse_error(#[case] format: OverlayFormat, #[case] body: &str) {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("override");
        fs::write(&path, body).expect("write override");
        let mut base = yaml("port: 1\n");
        let error = merge_from_file(&mut base, Some(&path), format)
            .expect_err("malformed override must fail");
        assert!(matches!(
            error,
            ConfigError::ParseStructured { .. } | ConfigError::ParseFlat { .. }
        ));
    }

    #[test]
    fn missing_explicit_override_is_an_error() {
        let mut base = yaml("port: 1\n");
        let missing = Path::new("/nonexistent/override.yaml");
        let error = merge_from_file(&mut base, Some(missing), OverlayFormat::Structured)
            .expect_err("missing explicit override must fail");
        assert!(matches!(error, ConfigError::Read { .. }));
    }
}
