/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Busy-wait helpers.
//!
//! Both helpers occupy the calling thread; nothing here yields to a
//! scheduler.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

/// Returned by [`poll_until`] when a bounded poll runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("condition still false after {polls} polls")]
pub struct PollTimeout {
    pub polls: u32,
}

/// Spin until `done()` returns `true`.
///
/// With `limit == None` the loop has no bound. With `Some(n)` at most `n`
/// evaluations return `false` before giving up.
///
/// Returns the number of evaluations that returned `false`.
pub fn poll_until(mut done: impl FnMut() -> bool, limit: Option<u32>) -> Result<u32, PollTimeout> {
    let mut polls: u32 = 0;
    loop {
        if done() {
            return Ok(polls);
        }
        polls = polls.saturating_add(1);
        if let Some(max) = limit {
            if polls >= max {
                return Err(PollTimeout { polls });
            }
        }
        std::hint::spin_loop();
    }
}

// ── Delay ─────────────────────────────────────────────────────────────────────

/// Fixed microsecond delays (datasheet settling times).
pub trait Delay: Send + Sync + fmt::Debug {
    fn delay_us(&self, us: u32);
}

/// Sleeps the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_us(&self, us: u32) {
        std::thread::sleep(Duration::from_micros(u64::from(us)));
    }
}

/// Records requested delays and returns immediately.
///
/// Used by tests and by the CLI's `--skip-delays` simulation mode.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    calls: Mutex<Vec<u32>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().clone()
    }

    pub fn total_us(&self) -> u64 {
        self.calls.lock().iter().map(|&us| u64::from(us)).sum()
    }
}

impl Delay for RecordingDelay {
    fn delay_us(&self, us: u32) {
        self.calls.lock().push(us);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
