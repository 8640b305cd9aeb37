// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Module descriptors and the process-wide module registry.
//!
//! Every cycle stores per-module configuration as a flat array keyed by
//! module index, so indices must be dense and stable for the lifetime of
//! the process. The registry assigns them once, at bootstrap, in
//! registration order.

use std::any::Any;

use thiserror::Error;

use crate::conf::{ConfError, ParseCtx};
use crate::cycle::Cycle;

/// Type tag distinguishing the core module from everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Core,
    Other,
}

/// Context a directive is accepted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    /// Top-level scalar key in the configuration file.
    Main,
    /// Key inside the module's own block (top-level table named after the
    /// module).
    Block,
}

/// One entry of a module's command table: a directive name, the context it
/// is accepted in, and a typed setter.
///
/// The setter receives the module's configuration slot (downcast by the
/// setter itself), the parse context for resources declared during parsing
/// (listening endpoints, open files, paths), and the raw TOML value.
pub struct Command {
    pub name: &'static str,
    pub context: Context,
    pub set: fn(&mut dyn Any, &mut ParseCtx<'_>, &toml::Value) -> Result<(), ConfError>,
}

/// Error returned by a module's `init_module`/`init_process` hook.
///
/// Hook failures are unrecoverable: partial module state cannot be rolled
/// back after commit, so the process exits with status 1.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ModuleError {
    pub message: String,
}

impl ModuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A module descriptor: name, type tag, command table, and lifecycle hooks.
pub trait Module {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ModuleKind;

    /// The module's directive table.
    fn commands(&self) -> &'static [Command];

    /// Allocate this module's per-cycle configuration slot.
    fn create_conf(&self) -> Box<dyn Any>;

    /// Called for every module once the new cycle has committed, before the
    /// old cycle's resources are diffed away.
    fn init_module(&self, _cycle: &mut Cycle) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Called in every worker process after it has adopted its cycle.
    fn init_process(&self, _cycle: &Cycle) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// The ordered, process-wide module list. Immutable after bootstrap; a
/// module's index is its position in the list.
pub struct Registry {
    modules: Vec<Box<dyn Module>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("modules", &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// Assemble the static module list. The core module registers first.
    pub fn bootstrap() -> Self {
        Self::with_modules(vec![
            Box::new(crate::conf::core::CoreModule),
            Box::new(crate::conf::server::ServerModule),
        ])
    }

    /// Build a registry from an explicit module list (tests register
    /// synthetic modules through this).
    pub fn with_modules(modules: Vec<Box<dyn Module>>) -> Self {
        Self { modules }
    }

    /// Number of registered modules; conf slot arrays are sized to this.
    pub fn max_module(&self) -> usize {
        self.modules.len()
    }

    /// Iterate modules with their assigned indices, in registration order.
    pub fn modules(&self) -> impl Iterator<Item = (usize, &dyn Module)> {
        self.modules.iter().enumerate().map(|(i, m)| (i, m.as_ref()))
    }

    pub fn by_name(&self, name: &str) -> Option<(usize, &dyn Module)> {
        self.modules().find(|(_, m)| m.name() == name)
    }

    /// Index of the core module's configuration slot.
    pub fn core_index(&self) -> usize {
        self.modules()
            .find(|(_, m)| m.kind() == ModuleKind::Core)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    pub fn core(&self) -> &dyn Module {
        self.modules[self.core_index()].as_ref()
    }
}

#[cfg(test)]
#[path = "module_tests.rs"]
mod tests;
