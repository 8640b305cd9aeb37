// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal latches and their watcher tasks.
//!
//! Watchers own the OS signal streams and do exactly two things per
//! delivery: store an atomic flag and wake the owning loop. All actual
//! work happens at the loop's next polling point, in its defined priority
//! order.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::debug;

const LATCH_COUNT: usize = 6;

/// Process-wide control flags, one per logical signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latch {
    Terminate,
    Quit,
    Reconfigure,
    Reopen,
    ChangeBinary,
    Respawn,
}

impl Latch {
    fn index(self) -> usize {
        match self {
            Latch::Terminate => 0,
            Latch::Quit => 1,
            Latch::Reconfigure => 2,
            Latch::Reopen => 3,
            Latch::ChangeBinary => 4,
            Latch::Respawn => 5,
        }
    }
}

/// The latch set plus a wake token for the loop that polls it.
pub struct Latches {
    flags: [AtomicBool; LATCH_COUNT],
    wake: Notify,
}

impl Latches {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            flags: std::array::from_fn(|_| AtomicBool::new(false)),
            wake: Notify::new(),
        })
    }

    /// Set the flag and wake the polling loop. Safe from any context.
    pub fn raise(&self, latch: Latch) {
        self.flags[latch.index()].store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_set(&self, latch: Latch) -> bool {
        self.flags[latch.index()].load(Ordering::SeqCst)
    }

    /// Read and clear.
    pub fn take(&self, latch: Latch) -> bool {
        self.flags[latch.index()].swap(false, Ordering::SeqCst)
    }

    /// Wait for the next `raise`.
    pub async fn notified(&self) {
        self.wake.notified().await;
    }
}

/// Which signal set to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchRole {
    Master,
    Worker,
}

/// Install the role's signal streams and spawn a watcher task per stream.
///
/// Logical mapping: SIGQUIT graceful shutdown, SIGTERM/SIGINT terminate,
/// SIGUSR1 reopen logs; masters additionally take SIGHUP reconfigure,
/// SIGUSR2 change binary, and SIGCHLD respawn.
pub fn spawn_watchers(role: WatchRole, latches: &Arc<Latches>) -> io::Result<()> {
    let mut pairs = vec![
        (SignalKind::quit(), Latch::Quit),
        (SignalKind::terminate(), Latch::Terminate),
        (SignalKind::interrupt(), Latch::Terminate),
        (SignalKind::user_defined1(), Latch::Reopen),
    ];
    if role == WatchRole::Master {
        pairs.push((SignalKind::hangup(), Latch::Reconfigure));
        pairs.push((SignalKind::user_defined2(), Latch::ChangeBinary));
        pairs.push((SignalKind::child(), Latch::Respawn));
    }

    for (kind, latch) in pairs {
        let mut stream = signal(kind)?;
        let latches = Arc::clone(latches);
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                debug!(?latch, "signal received");
                latches.raise(latch);
            }
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
