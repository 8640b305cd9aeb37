// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The master process: supervise workers, service signals.
//!
//! The outer loop is the spawn phase (one worker per configured slot);
//! the inner loop is supervision at a one-second tick. Latches are checked
//! in priority order: terminate/quit, change-binary, reconfigure, reopen.
//! A signal wake between ticks triggers the reap-and-respawn pass.

use std::ffi::OsString;
use std::process::Child;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use stoker_core::{init_cycle, BuildCtx, Cycle, Registry};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::lifecycle::{Paths, PidFile};
use crate::log::LogWriter;
use crate::signal::{spawn_watchers, Latch, Latches, WatchRole};
use crate::spawn;

/// Supervision tick.
const SUPERVISE_INTERVAL: Duration = Duration::from_secs(1);
/// Retired-cycle sweep period.
const CLEAN_INTERVAL: Duration = Duration::from_secs(30);
/// How long shutdown waits for workers to be reaped before exiting anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

struct WorkerProcess {
    child: Child,
    generation: u64,
    /// Replace on exit. Cleared once the worker's generation is retired.
    respawn: bool,
}

/// A cycle whose worker generation has not fully exited yet.
struct RetainedCycle {
    cycle: Cycle,
    generation: u64,
}

pub struct Master {
    registry: Registry,
    paths: Paths,
    argv0: OsString,
    writer: LogWriter,
    latches: std::sync::Arc<Latches>,
    pid: Option<PidFile>,
    cycle: Cycle,
    generation: u64,
    workers: Vec<WorkerProcess>,
    old_cycles: Vec<RetainedCycle>,
    /// Replacement binary images we spawned; reaped, never signaled.
    upgrades: Vec<Child>,
}

impl Master {
    pub fn new(
        registry: Registry,
        paths: Paths,
        argv0: OsString,
        writer: LogWriter,
        pid: PidFile,
        cycle: Cycle,
    ) -> Self {
        Self {
            registry,
            paths,
            argv0,
            writer,
            latches: Latches::new(),
            pid: Some(pid),
            cycle,
            generation: 0,
            workers: Vec::new(),
            old_cycles: Vec::new(),
            upgrades: Vec::new(),
        }
    }

    pub async fn run(mut self) -> i32 {
        if let Err(e) = spawn_watchers(WatchRole::Master, &self.latches) {
            error!(error = %e, "installing signal handlers failed");
            return 1;
        }
        info!(pid = std::process::id(), "master process started");

        loop {
            self.spawn_workers();
            self.retire_previous_generation();

            let mut tick = interval(SUPERVISE_INTERVAL);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut cleaner = interval(CLEAN_INTERVAL);
            cleaner.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let latches = std::sync::Arc::clone(&self.latches);

            loop {
                tokio::select! {
                    _ = tick.tick() => {}
                    _ = cleaner.tick() => { self.clean_old_cycles(); }
                    _ = latches.notified() => {}
                }

                if self.latches.is_set(Latch::Terminate) || self.latches.is_set(Latch::Quit) {
                    return self.shutdown().await;
                }

                if self.latches.take(Latch::ChangeBinary) {
                    self.change_binary();
                }

                if self.latches.take(Latch::Reconfigure) {
                    info!("reconfiguring");
                    match self.rebuild() {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(code) => return code,
                    }
                }

                if self.latches.take(Latch::Reopen) {
                    info!("reopening logs");
                    self.cycle.reopen_files();
                    self.writer.repoint_from(&self.cycle);
                    self.signal_workers(Signal::SIGUSR1);
                }

                if self.latches.take(Latch::Respawn) {
                    self.respawn_processes();
                }
            }
        }
    }

    /// Bring the current generation up to its configured worker count.
    fn spawn_workers(&mut self) {
        let want = self
            .cycle
            .core_conf()
            .map(|c| c.worker_processes() as usize)
            .unwrap_or(1);
        let have = self
            .workers
            .iter()
            .filter(|w| w.generation == self.generation)
            .count();

        for _ in have..want {
            match spawn::spawn_worker(&self.argv0, &self.cycle) {
                Ok(child) => {
                    info!(pid = child.id(), generation = self.generation, "started worker process");
                    self.workers.push(WorkerProcess {
                        child,
                        generation: self.generation,
                        respawn: true,
                    });
                }
                Err(e) => error!(error = %e, "spawning worker process failed"),
            }
        }
    }

    /// After a reconfigure has spawned the new generation, ask the old one
    /// to finish up and stop replacing its exits.
    fn retire_previous_generation(&mut self) {
        for w in &mut self.workers {
            if w.generation == self.generation || !w.respawn {
                continue;
            }
            w.respawn = false;
            info!(pid = w.child.id(), generation = w.generation, "signaling old worker to quit");
            signal_pid(w.child.id(), Signal::SIGQUIT);
        }
    }

    /// Reap exited children; replace current-generation workers unless the
    /// process is on its way out.
    fn respawn_processes(&mut self) {
        let exiting =
            self.latches.is_set(Latch::Terminate) || self.latches.is_set(Latch::Quit);

        let mut i = 0;
        while i < self.workers.len() {
            match self.workers[i].child.try_wait() {
                Ok(Some(status)) => {
                    let w = self.workers.remove(i);
                    info!(
                        pid = w.child.id(),
                        generation = w.generation,
                        %status,
                        "worker process exited"
                    );
                    if w.respawn && w.generation == self.generation && !exiting {
                        match spawn::spawn_worker(&self.argv0, &self.cycle) {
                            Ok(child) => {
                                info!(pid = child.id(), "respawned worker process");
                                self.workers.push(WorkerProcess {
                                    child,
                                    generation: self.generation,
                                    respawn: true,
                                });
                            }
                            Err(e) => error!(error = %e, "respawning worker process failed"),
                        }
                    }
                }
                Ok(None) => i += 1,
                Err(e) => {
                    error!(error = %e, "waiting for worker process failed");
                    i += 1;
                }
            }
        }

        self.upgrades.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                info!(pid = child.id(), %status, "new binary process exited");
                false
            }
            _ => true,
        });
    }

    /// Build a new cycle from the configuration file. `Ok(true)` means the
    /// swap happened and the spawn phase must run; `Ok(false)` keeps the
    /// current cycle; `Err` carries a fatal exit code.
    fn rebuild(&mut self) -> Result<bool, i32> {
        let ctx = BuildCtx {
            registry: &self.registry,
            conf_path: &self.paths.conf_path,
            error_log: &self.paths.error_log,
        };
        match init_cycle(&ctx, &mut self.cycle) {
            Ok(new_cycle) => {
                let old = std::mem::replace(&mut self.cycle, new_cycle);
                self.old_cycles.push(RetainedCycle { cycle: old, generation: self.generation });
                self.generation += 1;
                self.writer.repoint_from(&self.cycle);
                Ok(true)
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "reconfiguration failed");
                Err(1)
            }
            Err(e) => {
                error!(error = %e, "reconfiguration failed, keeping the current configuration");
                Ok(false)
            }
        }
    }

    /// Drop retained cycles whose worker generation has fully exited.
    fn clean_old_cycles(&mut self) {
        let workers = &self.workers;
        self.old_cycles.retain(|old| {
            let alive = workers.iter().any(|w| w.generation == old.generation);
            if !alive {
                debug!(generation = old.generation, "releasing retired cycle");
            }
            alive
        });
    }

    /// Start the replacement image with the listener handoff environment.
    /// The old master keeps running until the new one asks it to quit; its
    /// PID file moves aside so the new image can claim the canonical path.
    fn change_binary(&mut self) {
        info!("changing binary");
        if let Some(pid) = self.pid.as_mut() {
            if let Err(e) = pid.rename_for_upgrade() {
                error!(error = %e, "renaming PID file failed, not starting new binary");
                return;
            }
        }
        match spawn::spawn_new_binary(&self.argv0, &self.cycle) {
            Ok(child) => {
                info!(pid = child.id(), "started new binary process");
                self.upgrades.push(child);
            }
            Err(e) => {
                error!(error = %e, "starting new binary failed");
                if let Some(pid) = self.pid.as_mut() {
                    if let Err(e) = pid.restore_after_failed_upgrade() {
                        error!(error = %e, "restoring PID file failed");
                    }
                }
            }
        }
    }

    fn signal_workers(&self, sig: Signal) {
        for w in &self.workers {
            signal_pid(w.child.id(), sig);
        }
    }

    async fn shutdown(&mut self) -> i32 {
        info!("exiting");

        if let Some(pid) = self.pid.take() {
            pid.remove();
        }

        // Workers get the shutdown signal for both quit and terminate; a
        // worker skips its drain phase only when the operator signals it
        // directly.
        self.signal_workers(Signal::SIGQUIT);

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while !self.workers.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.workers.retain_mut(|w| match w.child.try_wait() {
                Ok(Some(_)) => false,
                _ => true,
            });
        }
        if !self.workers.is_empty() {
            warn!(remaining = self.workers.len(), "exiting before all workers were reaped");
        }

        info!("exit");
        0
    }
}

fn signal_pid(pid: u32, sig: Signal) {
    if let Err(e) = kill(Pid::from_raw(pid as i32), sig) {
        error!(pid, signal = %sig, error = %e, "signaling process failed");
    }
}

#[cfg(test)]
#[path = "master_tests.rs"]
mod tests;
