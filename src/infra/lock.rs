//! Per-path advisory edit lock
//!
//! Targets hash (xxh64 of the resolved path) into a fixed set of lock
//! stripes, so the lock directory never holds more than [`LOCK_STRIPES`]
//! files. Lock files are never deleted: unlinking one while another editor
//! waits on it would split the lock in two. Two targets sharing a stripe
//! only serialize with each other. The OS lock (`flock`/`LockFileEx` via
//! fd-lock) serializes both threads of one process and separate processes.

use anyhow::{Context, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Upper bound on lock files under the lock directory
pub const LOCK_STRIPES: u64 = 256;

pub struct EditLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl EditLock {
    /// Open (creating if needed) the lock file for `target`.
    pub fn open(lock_dir: &Path, target: &Path) -> Result<Self> {
        fs::create_dir_all(lock_dir)
            .with_context(|| format!("create lock dir: {}", lock_dir.display()))?;

        let path = Self::lock_path(lock_dir, target);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("open lock file: {}", path.display()))?;

        Ok(Self {
            path,
            lock: RwLock::new(file),
        })
    }

    /// Lock file location (stripe) for `target`
    pub fn lock_path(lock_dir: &Path, target: &Path) -> PathBuf {
        let key = target.to_string_lossy();
        let stripe = xxhash_rust::xxh64::xxh64(key.as_bytes(), 0) % LOCK_STRIPES;
        lock_dir.join(format!("{stripe:02x}.lock"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the exclusive lock is held.
    pub fn acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>> {
        debug!(lock = %self.path.display(), "waiting for edit lock");
        let path = self.path.clone();
        self.lock
            .write()
            .with_context(|| format!("acquire edit lock: {}", path.display()))
    }

    /// Take the exclusive lock without waiting.
    pub fn try_acquire(&mut self) -> std::io::Result<RwLockWriteGuard<'_, File>> {
        self.lock.try_write()
    }
}
