//! Liveness probing and forceful termination of instance processes.

#[cfg(unix)]
use tracing::{error, warn};

use super::error::LifecycleError;

#[cfg(unix)]
const PROBE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::probe");

/// Checks whether `pid` refers to a live process.
///
/// Sends a zero-signal probe. A process the caller may not signal counts as
/// alive: unknown liveness is liveness, so an instance is never wrongly
/// declared stopped. Any errno besides ESRCH/EPERM indicates an environment
/// problem and is fatal.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> Result<bool, LifecycleError> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid_t_from(pid)), None) {
        Ok(()) => Ok(true),
        Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(source) => Err(LifecycleError::ProbeFailed { pid, source }),
    }
}

/// Force-kills the process group of `pid`.
///
/// No-such-process and permission-denied are expected outcomes when
/// reclaiming a crashed instance; they are logged and do not abort a batch.
#[cfg(unix)]
pub fn terminate(pid: u32) -> Result<(), LifecycleError> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid_t_from(pid)), Signal::SIGKILL) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            warn!(target: PROBE_TARGET, pid, "process group not found while terminating");
            Ok(())
        }
        Err(Errno::EPERM) => {
            error!(target: PROBE_TARGET, pid, "access denied while terminating process group");
            Ok(())
        }
        Err(source) => Err(LifecycleError::SignalFailed { pid, source }),
    }
}

/// Terminates every pid in the batch; per-pid tolerated outcomes never block
/// the remaining pids, only fatal signal errors abort.
pub fn terminate_all(pids: &[u32]) -> Result<(), LifecycleError> {
    for pid in pids {
        terminate(*pid)?;
    }
    Ok(())
}

#[cfg(unix)]
#[allow(clippy::cast_possible_wrap, reason = "pids fit the platform pid_t range")]
fn pid_t_from(pid: u32) -> nix::libc::pid_t {
    pid as nix::libc::pid_t
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> Result<bool, LifecycleError> {
    Err(LifecycleError::UnsupportedPlatform)
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32) -> Result<(), LifecycleError> {
    Err(LifecycleError::UnsupportedPlatform)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn current_process_is_alive() {
        assert!(is_alive(std::process::id()).expect("probe self"));
    }

    #[test]
    fn reaped_child_is_not_alive() {
        let mut child = Command::new("true").spawn().expect("spawn child");
        let pid = child.id();
        child.wait().expect("reap child");
        assert!(!is_alive(pid).expect("probe reaped child"));
    }

    #[test]
    fn terminating_a_missing_group_is_tolerated() {
        let mut child = Command::new("true").spawn().expect("spawn child");
        let pid = child.id();
        child.wait().expect("reap child");
        terminate(pid).expect("missing process group is tolerated");
    }

    #[test]
    fn batch_terminate_survives_dead_members() {
        let mut child = Command::new("true").spawn().expect("spawn child");
        let pid = child.id();
        child.wait().expect("reap child");
        terminate_all(&[pid, pid]).expect("batch tolerates dead pids");
    }
}
