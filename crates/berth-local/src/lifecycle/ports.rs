//! Port assignment for role processes.
//!
//! With a fixed range start, ports are handed out sequentially so restarts
//! reuse stable addresses. Without one, the OS picks free ports via a
//! bind-to-zero probe. A configured port-locks directory coordinates
//! parallel runs on one host: each allocated port takes a non-blocking
//! exclusive lock on `<locks>/<port>`, and contended ports are skipped.

use std::net::TcpListener;
use std::path::PathBuf;

use tracing::debug;

use berth_config::RoleKind;

use super::error::LifecycleError;

const PORTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::ports");

const SEQUENTIAL_SCAN_LIMIT: u16 = 1000;
const EPHEMERAL_ATTEMPTS: u32 = 25;

#[derive(Debug)]
enum Strategy {
    Sequential { next: u16 },
    Ephemeral,
}

/// Hands out ports for one `start` attempt.
///
/// Held port locks live as long as the allocator, covering the window
/// between assignment and the role process binding its sockets.
#[derive(Debug)]
pub struct PortAllocator {
    strategy: Strategy,
    locks_dir: Option<PathBuf>,
    held: Vec<PortLock>,
}

impl PortAllocator {
    #[must_use]
    pub fn new(range_start: Option<u16>, locks_dir: Option<PathBuf>) -> Self {
        let strategy = match range_start {
            Some(next) => Strategy::Sequential { next },
            None => Strategy::Ephemeral,
        };
        Self {
            strategy,
            locks_dir,
            held: Vec::new(),
        }
    }

    /// Allocates the next port for a process of `role`.
    pub fn allocate(&mut self, role: RoleKind) -> Result<u16, LifecycleError> {
        match self.strategy {
            Strategy::Sequential { next } => self.allocate_sequential(role, next),
            Strategy::Ephemeral => self.allocate_ephemeral(role),
        }
    }

    fn allocate_sequential(&mut self, role: RoleKind, start: u16) -> Result<u16, LifecycleError> {
        let mut candidate = start;
        for _ in 0..SEQUENTIAL_SCAN_LIMIT {
            let next = candidate
                .checked_add(1)
                .ok_or(LifecycleError::PortsExhausted { role, start })?;
            self.strategy = Strategy::Sequential { next };
            if let Some(lock) = self.try_lock_port(candidate)? {
                self.held.push(lock);
                debug!(target: PORTS_TARGET, role = %role, port = candidate, "port assigned");
                return Ok(candidate);
            }
            candidate = next;
        }
        Err(LifecycleError::PortsExhausted { role, start })
    }

    fn allocate_ephemeral(&mut self, role: RoleKind) -> Result<u16, LifecycleError> {
        for _ in 0..EPHEMERAL_ATTEMPTS {
            let listener = TcpListener::bind(("127.0.0.1", 0))
                .map_err(|source| LifecycleError::PortProbe { source })?;
            let port = listener
                .local_addr()
                .map_err(|source| LifecycleError::PortProbe { source })?
                .port();
            drop(listener);
            if let Some(lock) = self.try_lock_port(port)? {
                self.held.push(lock);
                debug!(target: PORTS_TARGET, role = %role, port, "port assigned");
                return Ok(port);
            }
        }
        Err(LifecycleError::PortsExhausted { role, start: 0 })
    }

    /// Attempts the cross-process lock for `port`; `None` means the port is
    /// owned by another run and must be skipped. Without a locks directory
    /// every port is considered free.
    fn try_lock_port(&self, port: u16) -> Result<Option<PortLock>, LifecycleError> {
        let Some(dir) = &self.locks_dir else {
            return Ok(Some(PortLock::unlocked()));
        };
        PortLock::try_acquire(dir, port)
    }
}

#[derive(Debug)]
struct PortLock {
    #[cfg(unix)]
    _lock: Option<nix::fcntl::Flock<std::fs::File>>,
}

impl PortLock {
    fn unlocked() -> Self {
        Self {
            #[cfg(unix)]
            _lock: None,
        }
    }

    #[cfg(unix)]
    fn try_acquire(dir: &std::path::Path, port: u16) -> Result<Option<Self>, LifecycleError> {
        use nix::fcntl::{Flock, FlockArg};

        let path = dir.join(port.to_string());
        let file = std::fs::File::create(&path).map_err(|source| LifecycleError::Lock {
            path: path.clone(),
            source,
        })?;
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => Ok(Some(Self { _lock: Some(lock) })),
            Err((_, nix::errno::Errno::EWOULDBLOCK)) => {
                debug!(target: PORTS_TARGET, port, "port lock contended, skipping");
                Ok(None)
            }
            Err((_, errno)) => Err(LifecycleError::Lock {
                path,
                source: std::io::Error::from(errno),
            }),
        }
    }

    #[cfg(not(unix))]
    fn try_acquire(_dir: &std::path::Path, _port: u16) -> Result<Option<Self>, LifecycleError> {
        Ok(Some(Self::unlocked()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_allocation_is_consecutive_without_locks() {
        let mut allocator = PortAllocator::new(Some(21000), None);
        assert_eq!(allocator.allocate(RoleKind::Master).expect("port"), 21000);
        assert_eq!(allocator.allocate(RoleKind::Master).expect("port"), 21001);
        assert_eq!(allocator.allocate(RoleKind::Node).expect("port"), 21002);
    }

    #[test]
    fn ephemeral_allocation_yields_distinct_bindable_ports() {
        let mut allocator = PortAllocator::new(None, None);
        let first = allocator.allocate(RoleKind::Master).expect("port");
        let second = allocator.allocate(RoleKind::Proxy).expect("port");
        assert_ne!(first, 0);
        assert_ne!(second, 0);
    }

    #[cfg(unix)]
    #[test]
    fn locked_ports_are_skipped() {
        use tempfile::TempDir;

        let locks = TempDir::new().expect("temp dir");
        let mut holder = PortAllocator::new(Some(22000), Some(locks.path().to_path_buf()));
        assert_eq!(holder.allocate(RoleKind::Master).expect("port"), 22000);

        let mut contender = PortAllocator::new(Some(22000), Some(locks.path().to_path_buf()));
        assert_eq!(contender.allocate(RoleKind::Master).expect("port"), 22001);
    }
}
