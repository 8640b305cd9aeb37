// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration file parsing and directive dispatch.
//!
//! The configuration file is TOML. Top-level scalar keys are main-context
//! directives; top-level tables are module blocks whose keys are dispatched
//! against that module's command table. Setters are typed functions on the
//! command descriptors; there is no offset-into-struct dispatch.

pub mod core;
pub mod server;

use std::any::Any;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::cycle::{Cycle, OpenFile};
use crate::listening::Listening;
use crate::module::{Context, Registry};

/// Configuration errors. All of these abort the cycle build.
#[derive(Debug, Error)]
pub enum ConfError {
    #[error("cannot read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration syntax error in {path}: {source}")]
    Syntax {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown directive \"{name}\"")]
    UnknownDirective { name: String },

    #[error("unknown module block \"{name}\"")]
    UnknownModule { name: String },

    #[error("directive \"{directive}\" expects {expected}")]
    BadValue {
        directive: &'static str,
        expected: &'static str,
    },

    #[error("directive \"{directive}\": invalid listen address \"{value}\"")]
    BadAddress {
        directive: &'static str,
        value: String,
    },

    #[error("directive \"{directive}\" must be at least {min}")]
    OutOfRange {
        directive: &'static str,
        min: i64,
    },
}

/// Resources a directive may declare on the cycle under construction.
///
/// Setters get this alongside their own configuration slot so that, for
/// example, `listen` can append a listening endpoint while the cycle's conf
/// array is borrowed.
pub struct ParseCtx<'a> {
    pub listening: &'a mut Vec<Listening>,
    pub open_files: &'a mut Vec<OpenFile>,
    pub paths: &'a mut Vec<PathBuf>,
}

/// Parse the configuration file into the cycle under construction.
///
/// Every module that receives at least one directive gets its conf slot
/// populated; modules with a pre-created slot (the core module) keep it.
pub fn parse_file(registry: &Registry, path: &Path, cycle: &mut Cycle) -> Result<(), ConfError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let table: toml::Table = text.parse().map_err(|source| ConfError::Syntax {
        path: path.to_path_buf(),
        source,
    })?;

    let Cycle {
        listening,
        open_files,
        paths,
        conf_ctx,
        ..
    } = cycle;
    let mut ctx = ParseCtx {
        listening,
        open_files,
        paths,
    };

    for (key, value) in &table {
        match value {
            toml::Value::Table(block) => {
                let (index, module) = registry
                    .by_name(key)
                    .ok_or_else(|| ConfError::UnknownModule { name: key.clone() })?;
                if conf_ctx[index].is_none() {
                    conf_ctx[index] = Some(module.create_conf());
                }
                for (name, v) in block {
                    dispatch(registry, conf_ctx, &mut ctx, Context::Block, Some(index), name, v)?;
                }
            }
            _ => dispatch(registry, conf_ctx, &mut ctx, Context::Main, None, key, value)?,
        }
    }

    Ok(())
}

/// Route one directive to the owning module's setter.
///
/// `scope` restricts the search to a single module (block context); main
/// context searches every command table in registration order.
fn dispatch(
    registry: &Registry,
    conf_ctx: &mut [Option<Box<dyn Any>>],
    ctx: &mut ParseCtx<'_>,
    context: Context,
    scope: Option<usize>,
    name: &str,
    value: &toml::Value,
) -> Result<(), ConfError> {
    for (index, module) in registry.modules() {
        if scope.is_some_and(|s| s != index) {
            continue;
        }
        for cmd in module.commands() {
            if cmd.name != name || cmd.context != context {
                continue;
            }
            if conf_ctx[index].is_none() {
                conf_ctx[index] = Some(module.create_conf());
            }
            let slot = conf_ctx[index]
                .as_deref_mut()
                .ok_or_else(|| ConfError::UnknownDirective { name: name.to_string() })?;
            return (cmd.set)(slot, ctx, value);
        }
    }
    Err(ConfError::UnknownDirective { name: name.to_string() })
}

// Typed value accessors shared by setters.

pub(crate) fn expect_str<'v>(
    directive: &'static str,
    value: &'v toml::Value,
) -> Result<&'v str, ConfError> {
    value.as_str().ok_or(ConfError::BadValue {
        directive,
        expected: "a string",
    })
}

pub(crate) fn expect_bool(directive: &'static str, value: &toml::Value) -> Result<bool, ConfError> {
    value.as_bool().ok_or(ConfError::BadValue {
        directive,
        expected: "a boolean",
    })
}

pub(crate) fn expect_int(directive: &'static str, value: &toml::Value) -> Result<i64, ConfError> {
    value.as_integer().ok_or(ConfError::BadValue {
        directive,
        expected: "an integer",
    })
}

/// Parse a listen address: `host:port`, or `:port` for the wildcard host.
pub(crate) fn parse_listen_addr(
    directive: &'static str,
    value: &str,
) -> Result<SocketAddr, ConfError> {
    let bad = || ConfError::BadAddress {
        directive,
        value: value.to_string(),
    };
    if let Some(port) = value.strip_prefix(':') {
        let port: u16 = port.parse().map_err(|_| bad())?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    value.parse().map_err(|_| bad())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
