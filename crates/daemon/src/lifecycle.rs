// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process lifecycle plumbing: state-directory paths and the PID file.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::{error, info};

use crate::env;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to lock PID file: another instance running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to initialize logging: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fixed per-state-directory paths.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root state directory (e.g. ~/.local/state/stoker)
    pub state_dir: PathBuf,
    /// Configuration file consumed by every cycle build
    pub conf_path: PathBuf,
    /// Error log; open-file entry 0 of every cycle
    pub error_log: PathBuf,
    /// PID file path used when the configuration does not set one
    pub default_pid: PathBuf,
}

impl Paths {
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        std::fs::create_dir_all(&state_dir)?;
        Ok(Self {
            conf_path: env::conf_path(&state_dir),
            error_log: state_dir.join("stokerd.log"),
            default_pid: state_dir.join("stokerd.pid"),
            state_dir,
        })
    }
}

/// The PID file: exactly one writer per state directory, enforced with an
/// exclusive lock held for the life of the process.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    #[allow(dead_code)]
    lock: File,
}

impl PidFile {
    /// Create (or take over) the PID file and write this process's ID.
    ///
    /// Opened without truncation so a losing racer does not wipe the
    /// running instance's PID; truncated only once the lock is held.
    pub fn create(path: &Path) -> Result<Self, LifecycleError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut lock = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        lock.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

        lock.set_len(0)?;
        write!(lock, "{}", std::process::id())?;
        lock.flush()?;

        info!(path = %path.display(), pid = std::process::id(), "wrote PID file");
        Ok(Self { path: path.to_path_buf(), lock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Step aside for a replacement binary: move the PID file to its
    /// upgrade name so the new image can claim the canonical path. The
    /// lock follows the inode, so this process still holds its own file.
    pub fn rename_for_upgrade(&mut self) -> std::io::Result<()> {
        let upgraded = upgrade_path(&self.path);
        std::fs::rename(&self.path, &upgraded)?;
        info!(path = %upgraded.display(), "renamed PID file for binary upgrade");
        self.path = upgraded;
        Ok(())
    }

    /// Undo [`Self::rename_for_upgrade`] after a failed upgrade spawn.
    pub fn restore_after_failed_upgrade(&mut self) -> std::io::Result<()> {
        let Some(original) = self
            .path
            .to_str()
            .and_then(|p| p.strip_suffix(UPGRADE_SUFFIX))
            .map(PathBuf::from)
        else {
            return Ok(());
        };
        std::fs::rename(&self.path, &original)?;
        self.path = original;
        Ok(())
    }

    /// Delete the PID file at shutdown. Failure is logged and does not
    /// affect the exit status.
    pub fn remove(self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            error!(path = %self.path.display(), error = %e, "deleting PID file failed");
        }
    }
}

const UPGRADE_SUFFIX: &str = ".oldbin";

fn upgrade_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(UPGRADE_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
