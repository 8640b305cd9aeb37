// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stoker-core: configuration cycles for the stoker server
//!
//! A *cycle* is an immutable-after-commit snapshot of everything one
//! configuration needs at runtime: listening sockets, open log files, and
//! per-module configuration. This crate owns the module registry, the
//! configuration parser, and the cycle builder that turns an old cycle plus
//! a configuration file into a new cycle: transferring still-valid
//! listening sockets, opening what is new, and rolling back atomically on
//! failure.

pub mod conf;
pub mod cycle;
pub mod listening;
pub mod module;

pub use conf::core::{CoreConf, CoreModule, DEFAULT_CONNECTIONS, DEFAULT_WORKER_PROCESSES};
pub use conf::server::{ServerConf, ServerModule};
pub use conf::{ConfError, ParseCtx};
pub use cycle::build::{init_cycle, BuildCtx};
pub use cycle::{Cycle, CycleError, OpenFile};
pub use listening::Listening;
pub use module::{Command, Context, Module, ModuleError, ModuleKind, Registry};
