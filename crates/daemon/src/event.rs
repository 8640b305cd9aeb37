// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event-loop seam: a deadline-ordered timer queue and the blocking
//! `process_events` primitive the worker alternates with latch polling.
//!
//! An I/O engine would implement [`EventEngine`] over socket readiness as
//! well; the supervisory core only needs the timer half, and the drain
//! phase is defined against [`TimerQueue::is_empty`].

use std::collections::BTreeMap;
use std::io;
use std::time::Instant;

use async_trait::async_trait;
use tracing::trace;

/// Handle for cancelling a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId {
    deadline: Instant,
    seq: u64,
}

/// Deadline-ordered timers. Ties fire in insertion order.
#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: BTreeMap<(Instant, u64), String>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, deadline: Instant, name: impl Into<String>) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((deadline, seq), name.into());
        TimerId { deadline, seq }
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.entries.remove(&(id.deadline, id.seq)).is_some()
    }

    pub fn first_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every timer due at `now`, earliest first.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let remaining = self.entries.split_off(&(now, u64::MAX));
        let fired = std::mem::replace(&mut self.entries, remaining);
        fired.into_values().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The blocking event primitive: returns after the earliest timer expired
/// (firing everything due) or not at all when no timer is pending; the
/// caller races it against its wake source.
#[async_trait(?Send)]
pub trait EventEngine {
    async fn process_events(&mut self, timers: &mut TimerQueue) -> io::Result<()>;
}

/// Timer-only engine; the supervisory core's default.
#[derive(Debug, Default)]
pub struct TimerEngine;

#[async_trait(?Send)]
impl EventEngine for TimerEngine {
    async fn process_events(&mut self, timers: &mut TimerQueue) -> io::Result<()> {
        match timers.first_deadline() {
            Some(deadline) => {
                tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            }
            None => std::future::pending::<()>().await,
        }
        for name in timers.expire(Instant::now()) {
            trace!(timer = %name, "timer fired");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
