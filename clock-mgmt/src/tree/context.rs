/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-call view of the tree handed to a driver.

use tracing::warn;

use crate::error::{ClockError, Result};
use crate::hal::{Delay, RegisterBlock};

use super::{ClockId, ClockTree, NotifyStatus, OwnerId};

/// What a driver sees while one of its operations runs: its own identity
/// plus narrow access to the registers and to neighbouring nodes.
#[derive(Clone, Copy)]
pub struct ClockCtx<'a> {
    tree: &'a ClockTree,
    id: ClockId,
    name: &'a str,
}

impl<'a> ClockCtx<'a> {
    pub(crate) fn new(tree: &'a ClockTree, id: ClockId, name: &'a str) -> Self {
        Self { tree, id, name }
    }

    pub fn id(&self) -> ClockId {
        self.id
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn tree(&self) -> &'a ClockTree {
        self.tree
    }

    pub fn regs(&self) -> &'a dyn RegisterBlock {
        self.tree.registers()
    }

    pub fn delay(&self) -> &'a dyn Delay {
        self.tree.delay()
    }

    /// Owner identity this node uses when acting for its own consumers.
    pub fn as_owner(&self) -> OwnerId {
        OwnerId::Clock(self.id)
    }

    pub fn parent_rate(&self, parent: ClockId) -> Result<u32> {
        self.tree.get_rate(parent)
    }

    pub fn round_parent(&self, parent: ClockId, rate: u32, owner: OwnerId) -> Result<u32> {
        self.tree.negotiate_round(parent, rate, owner)
    }

    pub fn set_parent(&self, parent: ClockId, rate: u32, owner: OwnerId) -> Result<u32> {
        self.tree.negotiate_set(parent, rate, owner)
    }

    /// Announce a new output rate from inside `configure` or `set_rate`.
    ///
    /// Subscriber failures are logged and do not fail the caller; the
    /// hardware change has already been decided.
    pub fn announce(&self, rate: u32) -> NotifyStatus {
        match self.tree.notify_children(self.id, rate) {
            Ok(status) => status,
            Err(e) => {
                warn!(clock = self.name, rate, error = %e, "downstream rejected rate change");
                NotifyStatus::InUse
            }
        }
    }

    /// Forward a recomputed output rate from inside `notify`.
    ///
    /// Children are always asked, so the answer reflects current use even
    /// when the rate is unchanged. Subscribers only fire on an actual change.
    pub fn propagate(&self, rate: u32) -> Result<NotifyStatus> {
        self.tree.notify_children(self.id, rate)
    }

    pub fn invalid(&self, reason: impl Into<String>) -> ClockError {
        ClockError::invalid(self.name, reason)
    }

    pub fn unsupported(&self, operation: &'static str) -> ClockError {
        ClockError::unsupported(self.name, operation)
    }

    pub fn io(&self, addr: u32, value: u32, reason: &'static str) -> ClockError {
        ClockError::io(self.name, addr, value, reason)
    }
}
