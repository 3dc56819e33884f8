//! Durable pid ledger for one instance.
//!
//! The ledger's presence is the sole authoritative "instance considered
//! running" signal; writing it is therefore the last durable action of a
//! successful start, and the write replaces atomically so a reader never
//! observes a half-written pid list.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tracing::debug;

use super::error::LifecycleError;

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Reads the ordered pid list from `path`.
///
/// An unopenable file surfaces as `LedgerUnreadable`; the caller decides
/// whether absence means "already stopped".
pub fn read_ledger(path: &Path) -> Result<Vec<u32>, LifecycleError> {
    let content = fs::read_to_string(path).map_err(|source| LifecycleError::LedgerUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<u32>()
                .map_err(|source| LifecycleError::LedgerParse {
                    path: path.to_path_buf(),
                    source,
                })
        })
        .collect()
}

/// Writes `pids` to `path`, one decimal identifier per line, replacing any
/// prior content atomically.
pub fn write_ledger(path: &Path, pids: &[u32]) -> Result<(), LifecycleError> {
    let wrap = |source: io::Error| LifecycleError::LedgerWrite {
        path: path.to_path_buf(),
        source,
    };
    let staging = path.with_extension("txt.tmp");
    let mut file = File::create(&staging).map_err(wrap)?;
    for pid in pids {
        writeln!(file, "{pid}").map_err(wrap)?;
    }
    file.sync_all().map_err(wrap)?;
    drop(file);
    fs::rename(&staging, path).map_err(wrap)?;
    debug!(target: REGISTRY_TARGET, file = %path.display(), pids = pids.len(), "ledger written");
    Ok(())
}

/// Removes the ledger, tolerating absence.
pub fn remove_ledger(path: &Path) -> Result<(), LifecycleError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LifecycleError::LedgerWrite {
            path: path.to_path_buf(),
            source,
        }),
    }
}
