//! Role process spawning.
//!
//! Resolves the server binary for each role (explicit override, then a
//! `BERTH_<ROLE>_BIN` environment variable, then the packaged name), spawns
//! it as its own process-group leader pointed at its merged config, and
//! rolls back already-spawned peers when a later spawn fails.

use std::env;
use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use berth_config::RoleKind;

use super::error::LifecycleError;
use super::probe;
use super::types::RoleBinaries;

const SPAWN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::spawn");

/// Development proxy build used when sourcing the proxy from a checkout.
const PROXY_SOURCE_BUILD: &str = "target/debug/berth-proxy";

/// Resolves the binary launched for `kind`.
#[must_use]
pub fn resolve_binary(
    kind: RoleKind,
    overrides: &RoleBinaries,
    proxy_from_source: bool,
) -> OsString {
    let explicit = match kind {
        RoleKind::Master => overrides.master.as_ref(),
        RoleKind::Scheduler => overrides.scheduler.as_ref(),
        RoleKind::Node => overrides.node.as_ref(),
        RoleKind::Proxy => overrides.proxy.as_ref(),
    };
    if let Some(path) = explicit {
        return path.clone().into_os_string();
    }
    let env_var = match kind {
        RoleKind::Master => "BERTH_MASTER_BIN",
        RoleKind::Scheduler => "BERTH_SCHEDULER_BIN",
        RoleKind::Node => "BERTH_NODE_BIN",
        RoleKind::Proxy => "BERTH_PROXY_BIN",
    };
    if let Some(binary) = env::var_os(env_var) {
        return binary;
    }
    if kind == RoleKind::Proxy && proxy_from_source {
        return OsString::from(PROXY_SOURCE_BUILD);
    }
    OsString::from(format!("berth-{kind}"))
}

/// Spawns one role process and returns its pid.
///
/// The process becomes its own group leader so a later forceful stop can
/// reach helpers it forks. Spawning blocks only until the OS accepts the
/// spawn; readiness is the server's own concern.
pub fn spawn_role(
    kind: RoleKind,
    binary: &OsString,
    config_path: &Path,
    working_dir: &Path,
    capture_stderr: bool,
) -> Result<u32, LifecycleError> {
    let wrap = |source: io::Error| LifecycleError::SpawnFailed {
        role: kind,
        binary: binary.clone(),
        source,
    };
    let stderr = if capture_stderr {
        let stderr_path = working_dir.join("stderr.log");
        Stdio::from(File::create(stderr_path).map_err(wrap)?)
    } else {
        Stdio::inherit()
    };
    let mut command = Command::new(binary);
    command
        .arg("--config")
        .arg(config_path)
        .current_dir(working_dir)
        .stdout(Stdio::null())
        .stderr(stderr);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let child = command.spawn().map_err(wrap)?;
    let pid = child.id();
    debug!(target: SPAWN_TARGET, role = %kind, pid, binary = ?binary, "role process spawned");
    Ok(pid)
}

/// Best-effort rollback of the processes spawned by a failed start attempt.
pub fn rollback_spawned(pids: &[u32]) {
    if pids.is_empty() {
        return;
    }
    warn!(target: SPAWN_TARGET, count = pids.len(), "rolling back partially started instance");
    if let Err(error) = probe::terminate_all(pids) {
        warn!(target: SPAWN_TARGET, error = %error, "rollback terminate failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn explicit_override_wins() {
        let binaries = RoleBinaries {
            master: Some(PathBuf::from("/opt/cluster/master")),
            ..RoleBinaries::default()
        };
        assert_eq!(
            resolve_binary(RoleKind::Master, &binaries, false),
            OsString::from("/opt/cluster/master")
        );
    }

    #[rstest]
    #[case(RoleKind::Master, "BERTH_MASTER_BIN", "berth-master")]
    #[case(RoleKind::Scheduler, "BERTH_SCHEDULER_BIN", "berth-scheduler")]
    #[case(RoleKind::Node, "BERTH_NODE_BIN", "berth-node")]
    fn packaged_name_is_the_default(
        #[case] kind: RoleKind,
        #[case] env_var: &str,
        #[case] expected: &str,
    ) {
        let binaries = RoleBinaries::default();
        if env::var_os(env_var).is_none() {
            assert_eq!(
                resolve_binary(kind, &binaries, false),
                OsString::from(expected)
            );
        }
    }

    #[test]
    fn proxy_from_source_selects_the_development_build() {
        let binaries = RoleBinaries::default();
        if env::var_os("BERTH_PROXY_BIN").is_none() {
            assert_eq!(
                resolve_binary(RoleKind::Proxy, &binaries, true),
                OsString::from(PROXY_SOURCE_BUILD)
            );
            assert_eq!(
                resolve_binary(RoleKind::Proxy, &binaries, false),
                OsString::from("berth-proxy")
            );
        }
    }

    #[test]
    fn spawn_failure_names_role_and_binary() {
        let dir = TempDir::new().expect("temp dir");
        let binary = OsString::from("/nonexistent/berth-master");
        let error = spawn_role(
            RoleKind::Master,
            &binary,
            &dir.path().join("config.yaml"),
            dir.path(),
            false,
        )
        .expect_err("spawn of a missing binary must fail");
        match error {
            LifecycleError::SpawnFailed {
                role,
                binary: reported,
                ..
            } => {
                assert_eq!(role, RoleKind::Master);
                assert_eq!(reported, binary);
            }
            other => panic!("expected SpawnFailed, got: {other:?}"),
        }
    }
}
