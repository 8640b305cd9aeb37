// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The server module: listening endpoints and access logging.
//!
//! This is the minimal non-core module needed to drive cycle
//! initialization; protocol handling behind the endpoints lives outside
//! the supervisory core.

use std::any::Any;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::conf::{expect_str, parse_listen_addr, ConfError, ParseCtx};
use crate::cycle::OpenFile;
use crate::listening::Listening;
use crate::module::{Command, Context, Module, ModuleKind};

#[derive(Debug, Default)]
pub struct ServerConf {
    pub listen: Vec<SocketAddr>,
    pub access_log: Option<PathBuf>,
}

pub struct ServerModule;

static SERVER_COMMANDS: &[Command] = &[
    Command { name: "listen", context: Context::Block, set: set_listen },
    Command { name: "access_log", context: Context::Block, set: set_access_log },
];

fn server_conf(slot: &mut dyn Any) -> Option<&mut ServerConf> {
    slot.downcast_mut::<ServerConf>()
}

/// `listen = "host:port"` or `listen = ["host:port", ...]`; each address
/// adds a listening endpoint to the cycle under construction.
fn set_listen(
    slot: &mut dyn Any,
    ctx: &mut ParseCtx<'_>,
    value: &toml::Value,
) -> Result<(), ConfError> {
    let mut addrs = Vec::new();
    match value {
        toml::Value::Array(items) => {
            for item in items {
                addrs.push(parse_listen_addr("listen", expect_str("listen", item)?)?);
            }
        }
        _ => addrs.push(parse_listen_addr("listen", expect_str("listen", value)?)?),
    }

    for addr in addrs {
        ctx.listening.push(Listening::new(addr));
        if let Some(conf) = server_conf(slot) {
            conf.listen.push(addr);
        }
    }
    Ok(())
}

fn set_access_log(
    slot: &mut dyn Any,
    ctx: &mut ParseCtx<'_>,
    value: &toml::Value,
) -> Result<(), ConfError> {
    let path = PathBuf::from(expect_str("access_log", value)?);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ctx.paths.push(parent.to_path_buf());
        }
    }
    ctx.open_files.push(OpenFile::new(path.clone()));
    if let Some(conf) = server_conf(slot) {
        conf.access_log = Some(path);
    }
    Ok(())
}

impl Module for ServerModule {
    fn name(&self) -> &'static str {
        "server"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Other
    }

    fn commands(&self) -> &'static [Command] {
        SERVER_COMMANDS
    }

    fn create_conf(&self) -> Box<dyn Any> {
        Box::new(ServerConf::default())
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
