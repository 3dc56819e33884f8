//! Environment-sourced defaults for the lifecycle controller.
//!
//! The environment is consulted exactly once, at construction; every field
//! can be overridden by an explicit `start` parameter afterwards. No code
//! deeper in the lifecycle reads the process environment.

use std::env;
use std::path::PathBuf;

/// Root path override honoured when no explicit root is supplied.
pub const ROOT_PATH_VAR: &str = "BERTH_LOCAL_ROOT_PATH";
/// Toggle selecting the development proxy build over the packaged one.
pub const PROXY_FROM_SOURCE_VAR: &str = "BERTH_LOCAL_USE_PROXY_FROM_SOURCE";
/// Directory used for cross-process port-lock coordination.
pub const PORT_LOCKS_PATH_VAR: &str = "BERTH_LOCAL_PORT_LOCKS_PATH";

/// Defaults resolved from the environment at the outermost entry point.
#[derive(Debug, Clone, Default)]
pub struct LocalDefaults {
    pub root_path: Option<PathBuf>,
    pub proxy_from_source: bool,
    pub port_locks_path: Option<PathBuf>,
}

impl LocalDefaults {
    /// Reads the defaults from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            root_path: env::var_os(ROOT_PATH_VAR).map(PathBuf::from),
            proxy_from_source: bool_from_env(PROXY_FROM_SOURCE_VAR),
            port_locks_path: env::var_os(PORT_LOCKS_PATH_VAR).map(PathBuf::from),
        }
    }

    /// Resolves the instances root: explicit override, environment value,
    /// or the current working directory.
    #[must_use]
    pub fn resolve_root(&self, explicit: Option<&std::path::Path>) -> PathBuf {
        explicit
            .map(std::path::Path::to_path_buf)
            .or_else(|| self.root_path.clone())
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn bool_from_env(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .is_some_and(|value| value == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn explicit_root_wins_over_environment_default() {
        let defaults = LocalDefaults {
            root_path: Some(PathBuf::from("/from/env")),
            ..LocalDefaults::default()
        };
        assert_eq!(
            defaults.resolve_root(Some(Path::new("/explicit"))),
            PathBuf::from("/explicit")
        );
        assert_eq!(defaults.resolve_root(None), PathBuf::from("/from/env"));
    }

    #[test]
    fn missing_root_falls_back_to_current_dir() {
        let defaults = LocalDefaults::default();
        let resolved = defaults.resolve_root(None);
        assert!(resolved.is_absolute() || resolved == PathBuf::from("."));
    }
}
