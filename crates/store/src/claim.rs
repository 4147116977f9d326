//! Existence-check-then-claim locking for write-once artifacts.
//!
//! A claim is a `<artifact>.lock` file created with `create_new`, holding the
//! id of the run that owns it. A lock carrying our own run id belongs to a
//! sibling worker. A lock from another run belongs to a concurrent process
//! until it is older than the stale timeout; only then is it taken over.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::StoreError;

/// Held lock on an artifact path. Released on drop.
#[derive(Debug)]
pub struct Claim {
    lock_path: PathBuf,
}

impl Claim {
    /// Try to claim `target` for `run_id`.
    ///
    /// Returns `Ok(None)` while another worker holds the lock: a sibling of
    /// the same run, or another run whose lock is younger than `stale_after`.
    pub fn acquire(
        target: &Path,
        run_id: &str,
        stale_after: Duration,
    ) -> Result<Option<Claim>, StoreError> {
        let lock_path = lock_path_for(target);

        if let Some(claim) = try_create(&lock_path, run_id)? {
            return Ok(Some(claim));
        }

        let holder = fs::read_to_string(&lock_path).unwrap_or_default();
        let holder = holder.trim();
        if holder == run_id {
            debug!(path = %target.display(), "Artifact claimed by a sibling worker");
            return Ok(None);
        }

        let age = match lock_age(&lock_path) {
            Some(age) => age,
            // Released between our attempt and the stat.
            None => return try_create(&lock_path, run_id),
        };
        if age < stale_after {
            debug!(
                path = %target.display(),
                holder = %holder,
                age_secs = age.as_secs(),
                "Artifact claimed by another run"
            );
            return Ok(None);
        }

        warn!(
            path = %target.display(),
            stale_run = %holder,
            age_secs = age.as_secs(),
            "Reclaiming stale artifact lock"
        );
        match fs::remove_file(&lock_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e)),
        }
        try_create(&lock_path, run_id)
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.lock_path.display(), error = %e, "Failed to release artifact lock");
            }
        }
    }
}

fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Time since the lock was last written. `None` when it no longer exists;
/// a modification time in the future counts as brand new.
fn lock_age(lock_path: &Path) -> Option<Duration> {
    let modified = fs::metadata(lock_path).and_then(|m| m.modified()).ok()?;
    Some(modified.elapsed().unwrap_or(Duration::ZERO))
}

fn try_create(lock_path: &Path, run_id: &str) -> Result<Option<Claim>, StoreError> {
    match OpenOptions::new().write(true).create_new(true).open(lock_path) {
        Ok(mut file) => {
            file.write_all(run_id.as_bytes())?;
            file.flush()?;
            Ok(Some(Claim {
                lock_path: lock_path.to_path_buf(),
            }))
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(StoreError::Io(e)),
    }
}
