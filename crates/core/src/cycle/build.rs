// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cycle builder: construct a successor cycle from a predecessor plus
//! the configuration file, all-or-nothing.
//!
//! Resource acquisition is ordered so that failure at any point can be
//! rolled back without perturbing the old cycle: parse first, then open
//! files, then match inherited listening sockets, then bind what is new.
//! Only after everything succeeded do module commit hooks run and the old
//! cycle's leftover resources get closed.

use std::path::Path;

use tracing::{debug, info};

use crate::conf::core::CoreConf;
use crate::conf::parse_file;
use crate::cycle::{Cycle, CycleError, OpenFile};
use crate::module::Registry;

/// Inputs the builder needs besides the old cycle.
pub struct BuildCtx<'a> {
    pub registry: &'a Registry,
    pub conf_path: &'a Path,
    /// Path of the per-cycle error log; always open-file entry 0.
    pub error_log: &'a Path,
}

/// Build a new cycle from `old` plus the configuration file.
///
/// On success the old cycle's unneeded resources are closed: listeners
/// whose sockets were not transferred, and every old open file. Disposal
/// of the old cycle itself (drop now, or retain while its workers drain)
/// is the caller's decision.
///
/// On failure the old cycle is returned to its pre-call state and the
/// current configuration stays in force. The exception is
/// [`CycleError::ModuleInit`], which is fatal (see [`CycleError`]).
pub fn init_cycle(ctx: &BuildCtx<'_>, old: &mut Cycle) -> Result<Cycle, CycleError> {
    let mut cycle = Cycle::with_hints(old);

    // Per-cycle log.
    cycle.open_files.push(OpenFile::new(ctx.error_log.to_path_buf()));

    // Module conf slots; the core module's is created before parsing with
    // its tri-states unset.
    cycle.conf_ctx = (0..ctx.registry.max_module()).map(|_| None).collect();
    cycle.core_index = ctx.registry.core_index();
    cycle.conf_ctx[cycle.core_index] = Some(ctx.registry.core().create_conf());

    // Nothing is open yet, so parse failures need no rollback.
    parse_file(ctx.registry, ctx.conf_path, &mut cycle)?;

    cycle.connection_n = cycle
        .core_conf()
        .map(CoreConf::connections)
        .unwrap_or(crate::conf::core::DEFAULT_CONNECTIONS);

    let saved_remain: Vec<bool> = old.listening.iter().map(|ls| ls.remain).collect();
    match acquire(&mut cycle, old) {
        Ok(()) => {}
        Err(e) => {
            rollback(&mut cycle, old, &saved_remain);
            return Err(e);
        }
    }

    // Commit. Hook failures past this point are fatal to the process;
    // partial module state cannot be rolled back.
    for (_, module) in ctx.registry.modules() {
        module
            .init_module(&mut cycle)
            .map_err(|source| CycleError::ModuleInit { module: module.name(), source })?;
    }

    // Close and delete what is left from the old cycle.
    for ols in &mut old.listening {
        if !ols.remain {
            ols.close();
        }
    }
    for file in &mut old.open_files {
        file.close();
    }

    info!(
        listening = cycle.listening.len(),
        open_files = cycle.open_files.len(),
        "cycle committed"
    );
    Ok(cycle)
}

/// Steps 7–9: create paths, open files, match inherited sockets, bind new
/// ones. The first failure aborts; `rollback` undoes partial acquisition.
fn acquire(cycle: &mut Cycle, old: &mut Cycle) -> Result<(), CycleError> {
    for path in &cycle.paths {
        std::fs::create_dir_all(path).map_err(|source| CycleError::CreatePath {
            path: path.clone(),
            source,
        })?;
    }

    for file in &mut cycle.open_files {
        file.open().map_err(|source| CycleError::OpenFile {
            path: file.path.clone(),
            source,
        })?;
        debug!(path = %file.path.display(), "opened log file");
    }

    match_listeners(cycle, old)?;

    for ls in &mut cycle.listening {
        if ls.fd.is_some() {
            continue;
        }
        ls.open().map_err(|source| CycleError::Listen {
            addr: ls.addr_text.clone(),
            source,
        })?;
        debug!(addr = %ls.addr_text, fd = ?ls.fd, "listening");
    }

    Ok(())
}

/// Transfer sockets from old listeners whose address matches a new
/// listener exactly; ties favor the first unclaimed old listener. Matched
/// pairs are marked `remain` on both sides; unmatched new listeners are
/// marked `new`.
fn match_listeners(cycle: &mut Cycle, old: &mut Cycle) -> Result<(), CycleError> {
    if old.listening.is_empty() {
        for nls in &mut cycle.listening {
            nls.new = true;
        }
        return Ok(());
    }

    for ols in &mut old.listening {
        ols.remain = false;
    }

    for nls in &mut cycle.listening {
        for ols in &mut old.listening {
            if ols.ignore || ols.remain {
                continue;
            }
            if nls.addr != ols.addr {
                continue;
            }

            let Some(fd) = ols.fd else { continue };
            if fd as usize >= cycle.connection_n {
                return Err(CycleError::ListenerCapacity {
                    addr: ols.addr_text.clone(),
                    connections: cycle.connection_n,
                    required: fd as usize + 1,
                });
            }

            nls.fd = Some(fd);
            nls.remain = true;
            ols.remain = true;
            debug!(addr = %nls.addr_text, fd, "inherited listening socket from previous cycle");
            break;
        }

        if nls.fd.is_none() {
            nls.new = true;
        }
    }

    Ok(())
}

/// Undo a failed acquisition: close everything this build opened and
/// restore the old cycle's matching state to its pre-call values.
/// Transferred descriptors stay with the old cycle; only sockets this
/// build bound are closed.
fn rollback(cycle: &mut Cycle, old: &mut Cycle, saved_remain: &[bool]) {
    for file in &mut cycle.open_files {
        file.close();
    }
    for ls in &mut cycle.listening {
        if ls.new && ls.fd.is_some() {
            ls.close();
        }
    }
    for (ols, saved) in old.listening.iter_mut().zip(saved_remain) {
        ols.remain = *saved;
    }
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
