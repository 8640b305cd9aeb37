// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process spawning with listening-socket handoff.
//!
//! Listener descriptors are created close-on-exec; for the spawn window
//! the flag is cleared so the child inherits them, then restored. Identity
//! travels in the `STOKERD` environment variable. Workers, the detached
//! daemon re-spawn, and replacement binaries all go through the same path;
//! `argv[0]` is reused verbatim as the program.

use std::ffi::OsStr;
use std::io;
use std::os::fd::RawFd;
use std::process::{Child, Command, Stdio};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use stoker_core::Cycle;
use tracing::error;

use crate::env;
use crate::inherit;

/// Spawn a worker bound to `cycle`'s listeners.
pub fn spawn_worker(argv0: &OsStr, cycle: &Cycle) -> io::Result<Child> {
    let mut cmd = Command::new(argv0);
    cmd.env(env::PROCESS, env::WORKER_ROLE);
    cmd.env_remove(env::DAEMONIZED);
    spawn_with_listeners(cmd, cycle)
}

/// Spawn a replacement binary image; the caller keeps running until the
/// new image's master asks it to quit.
pub fn spawn_new_binary(argv0: &OsStr, cycle: &Cycle) -> io::Result<Child> {
    spawn_with_listeners(Command::new(argv0), cycle)
}

/// Re-spawn this image detached for `daemon` mode; the child calls
/// `setsid` on startup and adopts the already-bound listeners.
pub fn spawn_daemonized(argv0: &OsStr, cycle: &Cycle) -> io::Result<Child> {
    let mut cmd = Command::new(argv0);
    cmd.env(env::DAEMONIZED, "1")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    spawn_with_listeners(cmd, cycle)
}

fn spawn_with_listeners(mut cmd: Command, cycle: &Cycle) -> io::Result<Child> {
    cmd.env(env::LISTEN_FDS, inherit::encode(cycle));

    let fds: Vec<RawFd> = cycle.listening.iter().filter_map(|ls| ls.fd).collect();
    set_cloexec(&fds, false);
    let result = cmd.spawn();
    set_cloexec(&fds, true);
    result
}

/// Toggle FD_CLOEXEC on each descriptor. Failures are logged; a
/// descriptor that cannot be re-flagged is an operational error, not a
/// spawn failure.
fn set_cloexec(fds: &[RawFd], on: bool) {
    let flag = if on { FdFlag::FD_CLOEXEC } else { FdFlag::empty() };
    for &fd in fds {
        if let Err(e) = fcntl(fd, FcntlArg::F_SETFD(flag)) {
            error!(fd, error = %e, "fcntl(F_SETFD) on listening socket failed");
        }
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
