// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Advisory locking of the environments file across invocations.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

#[cfg(test)]
#[path = "./lock_test.rs"]
mod lock_test;

/// Pause between attempts while another process holds the lock.
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Who holds a lock, as written into the lock file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LockHolder {
    pub pid: u32,
    pub hostname: String,
    pub acquired: DateTime<Utc>,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
            acquired: Utc::now(),
        }
    }
}

impl std::fmt::Display for LockHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pid {} on {} since {}",
            self.pid,
            self.hostname,
            self.acquired.to_rfc3339()
        )
    }
}

/// Exclusive hold on an environments file for one read-modify-write cycle.
///
/// The lock is a sibling `<file>.lock` created with `create_new`; dropping
/// the guard deletes it, so it is released on every exit path.
#[derive(Debug)]
pub struct StoreLock {
    lock_file: PathBuf,
}

impl StoreLock {
    /// Lock file guarding `store_path`.
    pub fn lock_path(store_path: &Path) -> PathBuf {
        let mut name = store_path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("envs"));
        name.push(".lock");
        store_path.with_file_name(name)
    }

    /// Make a single attempt, returning `None` if someone else holds the lock.
    pub fn try_acquire(store_path: &Path) -> crate::Result<Option<Self>> {
        let lock_file = Self::lock_path(store_path);
        if let Some(parent) = lock_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| Error::WriteFailed {
                path: parent.to_path_buf(),
                error,
            })?;
        }

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_file)
        {
            Ok(mut file) => {
                let guard = Self { lock_file };
                let holder = serde_yaml::to_string(&LockHolder::current()).map_err(|error| {
                    Error::SerializeFailed {
                        what: "lock holder",
                        error,
                    }
                })?;
                file.write_all(holder.as_bytes())?;
                tracing::trace!(lock = %guard.lock_file.display(), "acquired store lock");
                Ok(Some(guard))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(Error::WriteFailed {
                path: lock_file,
                error: e,
            }),
        }
    }

    /// Wait up to `timeout` for the lock.
    pub fn acquire(store_path: &Path, timeout: Duration) -> crate::Result<Self> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(guard) = Self::try_acquire(store_path)? {
                return Ok(guard);
            }
            if reclaim_stale(&Self::lock_path(store_path))? {
                continue;
            }
            if Instant::now() >= deadline {
                let lock_file = Self::lock_path(store_path);
                let holder = read_holder(&lock_file)
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "an unknown process".to_string());
                return Err(Error::StoreLocked {
                    path: lock_file,
                    holder,
                });
            }
            tracing::debug!("waiting for store lock on {}", store_path.display());
            std::thread::sleep(RETRY_DELAY);
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_file
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.lock_file) {
            tracing::warn!(
                "failed to release store lock {}: {err}",
                self.lock_file.display()
            );
        }
    }
}

/// Remove `lock_file` if it was left behind by a process on this host
/// that no longer exists. Returns whether it was removed.
fn reclaim_stale(lock_file: &Path) -> crate::Result<bool> {
    let Some(holder) = read_holder(lock_file) else {
        return Ok(false);
    };
    if holder.hostname != LockHolder::current().hostname || is_process_running(holder.pid) {
        return Ok(false);
    }

    tracing::warn!(
        "removing stale store lock {} (pid {} is no longer running)",
        lock_file.display(),
        holder.pid
    );
    match std::fs::remove_file(lock_file) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(Error::WriteFailed {
            path: lock_file.to_path_buf(),
            error: e,
        }),
    }
}

/// Whether a process with `pid` exists on this machine.
#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // Signal 0 only checks for existence; EPERM means it exists as another user.
    matches!(kill(Pid::from_raw(raw), None::<Signal>), Ok(()) | Err(Errno::EPERM))
}

/// Liveness cannot be checked here, so every holder counts as running.
#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}

/// Read back who holds the lock, if the file is still there and readable.
pub fn read_holder(lock_file: &Path) -> Option<LockHolder> {
    let yaml = std::fs::read_to_string(lock_file).ok()?;
    serde_yaml::from_str(&yaml).ok()
}
