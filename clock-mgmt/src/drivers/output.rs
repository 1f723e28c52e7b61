/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Consumer-facing leaf clock.
//!
//! Every peripheral reaches the tree through one of these. It never
//! transforms its input; it exists so that a consumer has a node of its own
//! to subscribe to and to hold ownership through.

use tracing::debug;

use crate::drivers::{Capabilities, ClockConfig, ClockDriver};
use crate::error::Result;
use crate::tree::{forward, ClockCtx, ClockId, NotifyStatus, OwnerId};

#[derive(Debug, Clone, Copy)]
pub struct Output {
    parents: [ClockId; 1],
}

impl Output {
    pub fn new(parent: ClockId) -> Self {
        Self { parents: [parent] }
    }

    fn parent(&self) -> ClockId {
        self.parents[0]
    }
}

impl ClockDriver for Output {
    fn kind(&self) -> &'static str {
        "output"
    }

    fn parents(&self) -> &[ClockId] {
        &self.parents
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn get_rate(&self, cx: &ClockCtx<'_>) -> Result<u32> {
        cx.parent_rate(self.parent())
    }

    fn configure(&self, cx: &ClockCtx<'_>, config: &ClockConfig) -> Result<()> {
        let ClockConfig::Rate(hz) = *config else {
            return Err(cx.invalid(format!("output expects Rate, got {config:?}")));
        };
        let achieved = cx.set_parent(self.parent(), hz, cx.as_owner())?;
        debug!(clock = cx.name(), requested = hz, achieved, "output rate request");
        Ok(())
    }

    fn notify(&self, cx: &ClockCtx<'_>, _parent: ClockId, parent_rate: u32) -> Result<NotifyStatus> {
        forward(cx, parent_rate)?;
        Ok(NotifyStatus::InUse)
    }

    fn round_rate(&self, cx: &ClockCtx<'_>, rate: u32, owner: OwnerId) -> Result<u32> {
        cx.round_parent(self.parent(), rate, owner)
    }

    fn set_rate(&self, cx: &ClockCtx<'_>, rate: u32, owner: OwnerId) -> Result<u32> {
        cx.set_parent(self.parent(), rate, owner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
