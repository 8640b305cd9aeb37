// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::{Path, PathBuf};

use crate::lifecycle::LifecycleError;

/// Binary version (from Cargo.toml plus the build's git hash)
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

/// Inherited-socket list: decimal descriptor numbers, each terminated by
/// `:` or `;`, in listener order. Set for workers and across binary
/// replacement.
pub const LISTEN_FDS: &str = "STOKERD";

/// Role marker; set to [`WORKER_ROLE`] in spawned workers.
pub const PROCESS: &str = "STOKERD_PROCESS";

pub const WORKER_ROLE: &str = "worker";

/// Internal marker set on the detached re-spawn when `daemon` is on.
pub const DAEMONIZED: &str = "STOKERD_DAEMONIZED";

/// Resolve state directory: STOKERD_STATE_DIR > XDG_STATE_HOME/stoker > ~/.local/state/stoker
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("STOKERD_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("stoker"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/stoker"))
}

/// Configuration file path: STOKERD_CONF overrides the state-dir default.
pub fn conf_path(state_dir: &Path) -> PathBuf {
    std::env::var("STOKERD_CONF")
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir.join("stokerd.toml"))
}

pub fn inherited_sockets() -> Option<String> {
    std::env::var(LISTEN_FDS).ok().filter(|s| !s.is_empty())
}

pub fn is_worker() -> bool {
    std::env::var(PROCESS).is_ok_and(|v| v == WORKER_ROLE)
}

pub fn daemonized() -> bool {
    std::env::var(DAEMONIZED).is_ok()
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
