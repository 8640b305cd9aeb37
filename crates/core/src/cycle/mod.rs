// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The configuration cycle: one configuration's resources, owned together.
//!
//! A cycle is mutable while the builder assembles it and treated as
//! immutable once committed. Ownership of everything reachable from the
//! cycle ends with the cycle. Listening descriptors are the exception:
//! they follow the explicit transfer/close protocol in the builder, not
//! drop order.

pub mod build;

use std::any::Any;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::error;

use crate::conf::ConfError;
use crate::listening::Listening;
use crate::module::ModuleError;

/// Capacity hints for a cycle built without a predecessor.
const DEFAULT_PATHS_HINT: usize = 10;
const DEFAULT_OPEN_FILES_HINT: usize = 20;
const DEFAULT_LISTENING_HINT: usize = 10;

/// A named, append-mode log file.
#[derive(Debug)]
pub struct OpenFile {
    pub path: PathBuf,
    pub file: Option<File>,
}

impl OpenFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }

    /// Open read-write, create-or-open, append.
    pub fn open(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.file = Some(file);
        Ok(())
    }

    pub fn close(&mut self) {
        self.file = None;
    }

    /// Close and open again by path; the reopened descriptor points at
    /// whatever the path names now.
    pub fn reopen(&mut self) -> io::Result<()> {
        self.close();
        self.open()
    }
}

impl std::fmt::Debug for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cycle")
            .field("listening", &self.listening)
            .field("open_files", &self.open_files)
            .field("paths", &self.paths)
            .field("conf_ctx_len", &self.conf_ctx.len())
            .field("core_index", &self.core_index)
            .field("connection_n", &self.connection_n)
            .finish()
    }
}

/// An immutable-after-commit aggregate of one configuration's resources.
pub struct Cycle {
    pub listening: Vec<Listening>,
    /// Open log files; entry 0 is the cycle's error log.
    pub open_files: Vec<OpenFile>,
    /// Directories the configuration requires to exist.
    pub paths: Vec<PathBuf>,
    /// Per-module configuration, keyed by module index.
    pub conf_ctx: Vec<Option<Box<dyn Any>>>,
    /// Index of the core module's slot in `conf_ctx`.
    pub core_index: usize,
    /// Connection-table size; zero marks the bootstrap init cycle.
    pub connection_n: usize,
}

impl Cycle {
    /// The bootstrap init cycle: no configuration, no connection table.
    /// Inherited sockets decoded at startup are seeded into its listening
    /// array so the first build can match against them.
    pub fn init() -> Self {
        Self {
            listening: Vec::new(),
            open_files: Vec::new(),
            paths: Vec::new(),
            conf_ctx: Vec::new(),
            core_index: 0,
            connection_n: 0,
        }
    }

    fn with_hints(old: &Cycle) -> Self {
        let hint = |n: usize, fallback: usize| if n == 0 { fallback } else { n };
        Self {
            listening: Vec::with_capacity(hint(old.listening.len(), DEFAULT_LISTENING_HINT)),
            open_files: Vec::with_capacity(hint(old.open_files.len(), DEFAULT_OPEN_FILES_HINT)),
            paths: Vec::with_capacity(hint(old.paths.len(), DEFAULT_PATHS_HINT)),
            conf_ctx: Vec::new(),
            core_index: 0,
            connection_n: 0,
        }
    }

    pub fn is_init(&self) -> bool {
        self.connection_n == 0
    }

    pub fn conf<T: 'static>(&self, index: usize) -> Option<&T> {
        self.conf_ctx.get(index)?.as_ref()?.downcast_ref::<T>()
    }

    pub fn conf_mut<T: 'static>(&mut self, index: usize) -> Option<&mut T> {
        self.conf_ctx.get_mut(index)?.as_mut()?.downcast_mut::<T>()
    }

    /// The core module's configuration.
    pub fn core_conf(&self) -> Option<&crate::conf::core::CoreConf> {
        self.conf(self.core_index)
    }

    /// Reopen every open file by path. Idempotent; per-file failures are
    /// logged at error severity and leave that entry closed.
    pub fn reopen_files(&mut self) {
        for file in &mut self.open_files {
            if let Err(e) = file.reopen() {
                error!(path = %file.path.display(), error = %e, "reopening log file failed");
            }
        }
    }

    /// Stop accepting: close every listening socket.
    pub fn close_listening(&mut self) {
        for ls in &mut self.listening {
            ls.close();
        }
    }

    /// A handle on the cycle's error log, for re-pointing the process log
    /// sink after commit or reopen.
    pub fn error_log(&self) -> Option<File> {
        self.open_files
            .first()
            .and_then(|f| f.file.as_ref())
            .and_then(|f| f.try_clone().ok())
    }
}

/// Cycle build errors.
///
/// `ModuleInit` is fatal: the failing hook ran after commit and its partial
/// state cannot be rolled back, so callers must exit with status 1. Every
/// other variant is recoverable: the build rolled back and the old cycle
/// is untouched.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Conf(#[from] ConfError),

    #[error("cannot open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot create directory {path}: {source}")]
    CreatePath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("bind/listen on {addr} failed: {source}")]
    Listen {
        addr: String,
        #[source]
        source: nix::Error,
    },

    #[error(
        "{connections} connections is not enough to hold an open listening socket on {addr}, \
         required at least {required} connections"
    )]
    ListenerCapacity {
        addr: String,
        connections: usize,
        required: usize,
    },

    #[error("module \"{module}\" initialization failed: {source}")]
    ModuleInit {
        module: &'static str,
        #[source]
        source: ModuleError,
    },
}

impl CycleError {
    /// Whether the process must exit rather than keep the current cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CycleError::ModuleInit { .. })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
