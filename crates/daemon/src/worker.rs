// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker process: event loop over one cycle until told otherwise.
//!
//! Main phase alternates the blocking event primitive with latch polling.
//! Graceful quit enters the drain phase: listening stops, and the loop
//! runs until the timer queue empties so in-flight work gets its
//! configured timeouts.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use stoker_core::{Cycle, ModuleError, Registry};
use tracing::{error, info};

use crate::event::{EventEngine, TimerEngine, TimerQueue};
use crate::lifecycle::PidFile;
use crate::log::LogWriter;
use crate::signal::{spawn_watchers, Latch, Latches, WatchRole};

/// Run the worker to completion. Returns the process exit code; `pid` is
/// the PID file to delete on the way out in single-process mode.
pub async fn run(
    mut cycle: Cycle,
    registry: &Registry,
    writer: &LogWriter,
    pid: Option<PidFile>,
) -> i32 {
    let latches = Latches::new();
    if let Err(e) = spawn_watchers(WatchRole::Worker, &latches) {
        error!(error = %e, "installing signal handlers failed");
        return 1;
    }

    if let Err(e) = init_process(&mut cycle, registry) {
        error!(error = %e, "worker initialization failed");
        return 1;
    }

    let mut timers = TimerQueue::new();
    let mut engine = TimerEngine;
    let code = event_loop(&mut cycle, &latches, writer, &mut timers, &mut engine).await;

    if let Some(pid) = pid {
        pid.remove();
    }
    info!("exit");
    code
}

/// Per-process initialization: drop privileges, seed the RNG, clear
/// cross-cycle carry-over flags, and run every module's process hook.
/// Any failure here is fatal.
fn init_process(cycle: &mut Cycle, registry: &Registry) -> Result<(), ModuleError> {
    if let Some(uid) = cycle.core_conf().and_then(|c| c.user_id) {
        nix::unistd::setuid(uid)
            .map_err(|e| ModuleError::new(format!("setuid({uid}) failed: {e}")))?;
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    fastrand::seed((u64::from(std::process::id()) << 16) ^ nanos);

    // Workers do not track cross-cycle carry-over.
    for ls in &mut cycle.listening {
        ls.remain = false;
    }

    for (_, module) in registry.modules() {
        module.init_process(cycle)?;
    }
    Ok(())
}

/// Main and drain phases. Factored from `run` so tests can drive it with
/// their own latches, timers, and engine.
pub(crate) async fn event_loop<E: EventEngine>(
    cycle: &mut Cycle,
    latches: &Arc<Latches>,
    writer: &LogWriter,
    timers: &mut TimerQueue,
    engine: &mut E,
) -> i32 {
    loop {
        tokio::select! {
            r = engine.process_events(timers) => {
                if let Err(e) = r {
                    error!(error = %e, "event processing error");
                }
            }
            _ = latches.notified() => {}
        }

        if latches.is_set(Latch::Terminate) {
            info!("exiting");
            return 0;
        }
        if latches.take(Latch::Quit) {
            info!("gracefully shutting down");
            break;
        }
        if latches.take(Latch::Reopen) {
            info!("reopening logs");
            cycle.reopen_files();
            writer.repoint_from(cycle);
        }
    }

    // Drain: stop accepting, let the remaining timers run out.
    cycle.close_listening();
    loop {
        if timers.is_empty() {
            info!("exiting");
            return 0;
        }

        tokio::select! {
            r = engine.process_events(timers) => {
                if let Err(e) = r {
                    error!(error = %e, "event processing error");
                }
            }
            _ = latches.notified() => {}
        }

        if latches.is_set(Latch::Terminate) {
            info!("exiting");
            return 0;
        }
        if latches.take(Latch::Reopen) {
            cycle.reopen_files();
            writer.repoint_from(cycle);
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
