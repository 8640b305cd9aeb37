// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The core module: process-level directives.
//!
//! The core module has a special place in the build: its conf slot is
//! created before the configuration file is parsed, with the tri-state
//! fields unset. Defaults are materialized by `init_module` at cycle
//! commit.

use std::any::Any;
use std::path::PathBuf;

use nix::unistd::{Uid, User};

use crate::conf::{expect_bool, expect_int, expect_str, ConfError, ParseCtx};
use crate::cycle::Cycle;
use crate::module::{Command, Context, Module, ModuleError, ModuleKind};

pub const DEFAULT_WORKER_PROCESSES: u32 = 1;
pub const DEFAULT_CONNECTIONS: usize = 512;

/// Core configuration. Tri-states stay `None` until commit.
#[derive(Debug, Default)]
pub struct CoreConf {
    /// Target UID name for workers.
    pub user: Option<String>,
    /// Resolved at commit from `user`.
    pub user_id: Option<Uid>,
    /// Detach from the terminal at startup. Default on.
    pub daemon: Option<bool>,
    /// Run the worker loop in the initial process, no master. Default off.
    pub single_process: Option<bool>,
    /// PID file path; the platform default applies when unset.
    pub pid: Option<PathBuf>,
    /// Worker slots for the master's spawn phase.
    pub worker_processes: Option<u32>,
    /// Connection-table size; bounds inherited descriptor values.
    pub connections: Option<usize>,
}

impl CoreConf {
    pub fn daemon(&self) -> bool {
        self.daemon.unwrap_or(true)
    }

    pub fn single_process(&self) -> bool {
        self.single_process.unwrap_or(false)
    }

    pub fn worker_processes(&self) -> u32 {
        self.worker_processes.unwrap_or(DEFAULT_WORKER_PROCESSES)
    }

    pub fn connections(&self) -> usize {
        self.connections.unwrap_or(DEFAULT_CONNECTIONS)
    }
}

pub struct CoreModule;

static CORE_COMMANDS: &[Command] = &[
    Command { name: "user", context: Context::Main, set: set_user },
    Command { name: "daemon", context: Context::Main, set: set_daemon },
    Command { name: "single_process", context: Context::Main, set: set_single_process },
    Command { name: "pid", context: Context::Main, set: set_pid },
    Command { name: "worker_processes", context: Context::Main, set: set_worker_processes },
    Command { name: "connections", context: Context::Main, set: set_connections },
];

fn core_conf(slot: &mut dyn Any) -> Option<&mut CoreConf> {
    slot.downcast_mut::<CoreConf>()
}

fn set_user(
    slot: &mut dyn Any,
    _ctx: &mut ParseCtx<'_>,
    value: &toml::Value,
) -> Result<(), ConfError> {
    let user = expect_str("user", value)?.to_string();
    if let Some(conf) = core_conf(slot) {
        conf.user = Some(user);
    }
    Ok(())
}

fn set_daemon(
    slot: &mut dyn Any,
    _ctx: &mut ParseCtx<'_>,
    value: &toml::Value,
) -> Result<(), ConfError> {
    let on = expect_bool("daemon", value)?;
    if let Some(conf) = core_conf(slot) {
        conf.daemon = Some(on);
    }
    Ok(())
}

fn set_single_process(
    slot: &mut dyn Any,
    _ctx: &mut ParseCtx<'_>,
    value: &toml::Value,
) -> Result<(), ConfError> {
    let on = expect_bool("single_process", value)?;
    if let Some(conf) = core_conf(slot) {
        conf.single_process = Some(on);
    }
    Ok(())
}

fn set_pid(
    slot: &mut dyn Any,
    _ctx: &mut ParseCtx<'_>,
    value: &toml::Value,
) -> Result<(), ConfError> {
    let path = PathBuf::from(expect_str("pid", value)?);
    if let Some(conf) = core_conf(slot) {
        conf.pid = Some(path);
    }
    Ok(())
}

fn set_worker_processes(
    slot: &mut dyn Any,
    _ctx: &mut ParseCtx<'_>,
    value: &toml::Value,
) -> Result<(), ConfError> {
    let n = expect_int("worker_processes", value)?;
    if n < 1 {
        return Err(ConfError::OutOfRange { directive: "worker_processes", min: 1 });
    }
    if let Some(conf) = core_conf(slot) {
        conf.worker_processes = Some(n as u32);
    }
    Ok(())
}

fn set_connections(
    slot: &mut dyn Any,
    _ctx: &mut ParseCtx<'_>,
    value: &toml::Value,
) -> Result<(), ConfError> {
    let n = expect_int("connections", value)?;
    if n < 1 {
        return Err(ConfError::OutOfRange { directive: "connections", min: 1 });
    }
    if let Some(conf) = core_conf(slot) {
        conf.connections = Some(n as usize);
    }
    Ok(())
}

impl Module for CoreModule {
    fn name(&self) -> &'static str {
        "core"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Core
    }

    fn commands(&self) -> &'static [Command] {
        CORE_COMMANDS
    }

    fn create_conf(&self) -> Box<dyn Any> {
        Box::new(CoreConf::default())
    }

    /// Materialize tri-state defaults and resolve the worker UID.
    fn init_module(&self, cycle: &mut Cycle) -> Result<(), ModuleError> {
        let index = cycle.core_index;
        let Some(conf) = cycle.conf_mut::<CoreConf>(index) else {
            return Err(ModuleError::new("core configuration slot missing"));
        };
        conf.daemon.get_or_insert(true);
        conf.single_process.get_or_insert(false);
        conf.worker_processes.get_or_insert(DEFAULT_WORKER_PROCESSES);
        conf.connections.get_or_insert(DEFAULT_CONNECTIONS);

        if let Some(name) = conf.user.clone() {
            let user = User::from_name(&name)
                .map_err(|e| ModuleError::new(format!("getpwnam({name}) failed: {e}")))?
                .ok_or_else(|| ModuleError::new(format!("unknown user \"{name}\"")))?;
            conf.user_id = Some(user.uid);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "core_tests.rs"]
mod tests;
