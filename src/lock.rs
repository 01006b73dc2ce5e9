//! Run-wide exclusive lock.
//!
//! A provisioning run mutates firewall rules, fail2ban configuration and
//! the daemon's running state, so only one run may be in progress per
//! host. The lock is an flock-style advisory lock held for the lifetime
//! of [`ProvisionLock`].

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const DEFAULT_LOCK_FILE: &str = "/run/jailsmith.lock";

/// Holds the exclusive lock until dropped.
#[derive(Debug)]
pub struct ProvisionLock {
    _file: File,
    path: PathBuf,
}

impl ProvisionLock {
    /// Acquire the lock without blocking.
    ///
    /// Fails immediately if another run holds it.
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).ok();
        }

        // create without truncate: no window between creation and locking
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        fs::set_permissions(lock_path, fs::Permissions::from_mode(0o600))
            .context("Failed to set lock file permissions")?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "Another jailsmith run is in progress.\n\
                 Wait for it to finish, or remove the stale lock file: {:?}",
                lock_path
            )
        })?;

        Ok(Self {
            _file: file,
            path: lock_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
