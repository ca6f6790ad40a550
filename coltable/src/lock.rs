// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Advisory locking of on-disk tables.

Several processes may want to flush into the same snapshot. A lock is a file
named `table.lock` inside the table directory, created exclusively; it holds
the PID of its owner for the benefit of humans. Dropping the `TableLock`
removes the file, so the lock is released on every exit path, including
early returns and unwinding.

*/

use log::{debug, info};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::errors::{Result, TableError};

pub const LOCK_FILE_NAME: &str = "table.lock";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The default amount of time `TableLock::acquire` waits.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct TableLock {
    path: PathBuf,
}

impl TableLock {
    /// Try once to lock the table at `dir`. Returns `Ok(None)` if somebody
    /// else holds the lock.
    pub fn try_acquire<P: AsRef<Path>>(dir: P) -> Result<Option<TableLock>> {
        let path = dir.as_ref().join(LOCK_FILE_NAME);

        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                writeln!(f, "{}", std::process::id())?;
                info!(
                    "process {} has acquired a lock for {}",
                    std::process::id(),
                    dir.as_ref().display()
                );
                Ok(Some(TableLock { path }))
            }

            Err(ref e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),

            Err(e) => Err(e.into()),
        }
    }

    /// Lock the table at `dir`, waiting up to `timeout` for another holder
    /// to let go.
    pub fn acquire<P: AsRef<Path>>(dir: P, timeout: Duration) -> Result<TableLock> {
        let dir = dir.as_ref();
        let t0 = Instant::now();

        loop {
            if let Some(lock) = Self::try_acquire(dir)? {
                return Ok(lock);
            }

            if t0.elapsed() >= timeout {
                return Err(TableError::Locked(dir.to_owned()));
            }

            debug!("waiting for the lock on {}", dir.display());
            thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TableLock {
    fn drop(&mut self) {
        info!(
            "process {} is going to release a lock ({})",
            std::process::id(),
            self.path.display()
        );

        // Nothing can be done about a failure here; a stale lock file will
        // be reported as a timeout by the next acquirer.
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();

        let first = TableLock::try_acquire(dir.path()).unwrap();
        assert!(first.is_some());
        assert!(TableLock::try_acquire(dir.path()).unwrap().is_none());
        assert!(matches!(
            TableLock::acquire(dir.path(), Duration::from_millis(120)),
            Err(TableError::Locked(_))
        ));

        drop(first);
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());
        assert!(TableLock::try_acquire(dir.path()).unwrap().is_some());
    }
}
