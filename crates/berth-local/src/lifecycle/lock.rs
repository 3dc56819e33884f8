//! Advisory sandbox lock serialising concurrent `start` attempts.
//!
//! Two `start` calls for the same id must not both observe "no ledger" and
//! proceed to spawn. The lock is held from the ledger existence check
//! through the ledger write and releases when the guard drops.

use std::fs::File;
#[cfg(unix)]
use std::io;
use std::path::Path;

use super::error::LifecycleError;

/// Guard holding an exclusive advisory lock on a sandbox.
#[derive(Debug)]
pub struct SandboxLock {
    #[cfg(unix)]
    _lock: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _file: File,
}

impl SandboxLock {
    /// Takes an exclusive lock on the file at `path`, blocking until the
    /// competing holder releases it.
    pub fn acquire(path: &Path) -> Result<Self, LifecycleError> {
        let file = File::create(path).map_err(|source| LifecycleError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
        #[cfg(unix)]
        {
            let lock = nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusive)
                .map_err(|(_, errno)| LifecycleError::Lock {
                    path: path.to_path_buf(),
                    source: io::Error::from(errno),
                })?;
            Ok(Self { _lock: lock })
        }
        #[cfg(not(unix))]
        {
            Ok(Self { _file: file })
        }
    }
}
