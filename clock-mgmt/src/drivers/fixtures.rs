/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Shared test scaffolding for driver and tree tests.

use std::sync::Arc;

use crate::drivers::{Capabilities, ClockDriver};
use crate::error::Result;
use crate::hal::{MemoryRegisters, RecordingDelay};
use crate::tree::{ClockCtx, ClockId, ClockTree, NotifyStatus, OwnerId, TopologyBuilder};

/// Builder plus the register mirror and delay it will be wired to.
pub(crate) struct Fixture {
    pub regs: Arc<MemoryRegisters>,
    pub delay: Arc<RecordingDelay>,
    builder: TopologyBuilder,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            regs: Arc::new(MemoryRegisters::new()),
            delay: Arc::new(RecordingDelay::new()),
            builder: TopologyBuilder::new(),
        }
    }

    pub fn add(&mut self, name: &str, driver: impl ClockDriver + 'static) -> ClockId {
        self.builder.add(name, driver).expect("fixture topology is valid")
    }

    pub fn build(self) -> ClockTree {
        self.builder.build(self.regs, self.delay)
    }
}

/// A child that rejects every notification.
#[derive(Debug)]
pub(crate) struct Failing {
    parents: [ClockId; 1],
    caps: Capabilities,
}

impl Failing {
    pub fn new(parent: ClockId) -> Self {
        Self {
            parents: [parent],
            caps: Capabilities::NOTIFY,
        }
    }

    /// Same node without the notify capability.
    pub fn silent(parent: ClockId) -> Self {
        Self {
            parents: [parent],
            caps: Capabilities::empty(),
        }
    }
}

impl ClockDriver for Failing {
    fn kind(&self) -> &'static str {
        "failing"
    }

    fn parents(&self) -> &[ClockId] {
        &self.parents
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn get_rate(&self, cx: &ClockCtx<'_>) -> Result<u32> {
        Err(cx.io(0, 0, "test node has no rate"))
    }

    fn notify(&self, cx: &ClockCtx<'_>, _parent: ClockId, _parent_rate: u32) -> Result<NotifyStatus> {
        Err(cx.invalid("rejects every rate"))
    }
}

/// Root node whose rate reports whether it is currently held.
#[derive(Debug)]
pub(crate) struct ReadsOwner;

impl ClockDriver for ReadsOwner {
    fn kind(&self) -> &'static str {
        "reads_owner"
    }

    fn parents(&self) -> &[ClockId] {
        &[]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ROUND_RATE | Capabilities::SET_RATE
    }

    fn get_rate(&self, cx: &ClockCtx<'_>) -> Result<u32> {
        Ok(u32::from(cx.tree().owner(cx.id()).is_some()))
    }

    fn round_rate(&self, cx: &ClockCtx<'_>, _rate: u32, _owner: OwnerId) -> Result<u32> {
        self.get_rate(cx)
    }

    fn set_rate(&self, cx: &ClockCtx<'_>, _rate: u32, _owner: OwnerId) -> Result<u32> {
        self.get_rate(cx)
    }
}
