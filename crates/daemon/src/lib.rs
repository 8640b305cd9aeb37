// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stoker daemon library
//!
//! Exposes the supervisory building blocks behind the `stokerd` binary:
//! signal latches, the timer/event seam, the inherited-socket protocol,
//! and process lifecycle plumbing. Embedders and integration tests use
//! these; the binary wires them together in `main.rs`.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod event;
pub mod inherit;
pub mod lifecycle;
pub mod log;
pub mod master;
pub mod signal;
pub mod spawn;
pub mod worker;

pub use event::{EventEngine, TimerEngine, TimerId, TimerQueue};
pub use inherit::{decode, encode, set_inherited};
pub use lifecycle::{LifecycleError, Paths, PidFile};
pub use log::{init_tracing, LogWriter};
pub use master::Master;
pub use signal::{spawn_watchers, Latch, Latches, WatchRole};
