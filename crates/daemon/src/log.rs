// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Re-openable log sink behind the tracing subscriber.
//!
//! The reopen-logs protocol swaps the error-log descriptor at runtime, so
//! the subscriber cannot own its file directly. It writes through a shared
//! handle that starts on stderr and is re-pointed at the committed cycle's
//! error log, again after every reopen.

use std::fs::File;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use stoker_core::Cycle;
use tracing_subscriber::fmt::MakeWriter;

use crate::lifecycle::LifecycleError;

enum Target {
    Stderr,
    File(File),
}

/// Shared, re-pointable writer handle. Cloning shares the target.
#[derive(Clone)]
pub struct LogWriter {
    target: Arc<Mutex<Target>>,
}

impl LogWriter {
    /// A writer on stderr; the sink until the first cycle commits.
    pub fn stderr() -> Self {
        Self { target: Arc::new(Mutex::new(Target::Stderr)) }
    }

    /// Swap the sink to `file`. Subsequent writes from every clone land
    /// there.
    pub fn repoint(&self, file: File) {
        *self.target.lock() = Target::File(file);
    }

    /// Point the sink at the cycle's error log, if it is open.
    pub fn repoint_from(&self, cycle: &Cycle) {
        if let Some(file) = cycle.error_log() {
            self.repoint(file);
        }
    }
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut *self.target.lock() {
            Target::Stderr => io::stderr().write(buf),
            Target::File(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *self.target.lock() {
            Target::Stderr => io::stderr().flush(),
            Target::File(f) => f.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Install the global subscriber: env-filtered (default `info`), plain
/// text, writing through `writer`.
pub fn init_tracing(writer: LogWriter) -> Result<(), LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .map_err(|e| LifecycleError::Logging(e.to_string()))
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
