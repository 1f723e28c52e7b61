/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! On/off pass-through gate controlled by one enable bit.
//!
//! Ordering on the bus: consumers are told `0` before the bit is cleared,
//! and the parent's rate after it is set, so nothing downstream ever believes
//! a clock is running while it is stopped.

use tracing::debug;

use crate::drivers::{Capabilities, ClockConfig, ClockDriver};
use crate::error::{ClockError, Result};
use crate::hal::BitRef;
use crate::tree::{forward, ClockCtx, ClockId, NotifyStatus, OwnerId};

#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    pub parent: ClockId,
    pub enable: BitRef,
}

#[derive(Debug, Clone, Copy)]
pub struct Gate {
    parents: [ClockId; 1],
    enable: BitRef,
}

impl Gate {
    /// # Errors
    /// `Topology` if `bit` is not a valid bit position.
    pub fn new(parent: ClockId, reg: u32, bit: u8) -> Result<Self> {
        let enable = BitRef::new(reg, bit)
            .ok_or_else(|| ClockError::Topology(format!("gate bit {bit} out of range")))?;
        Ok(Self::with_config(GateConfig { parent, enable }))
    }

    pub fn with_config(cfg: GateConfig) -> Self {
        Self {
            parents: [cfg.parent],
            enable: cfg.enable,
        }
    }

    fn parent(&self) -> ClockId {
        self.parents[0]
    }

    fn is_open(&self, cx: &ClockCtx<'_>) -> bool {
        self.enable.is_set(cx.regs())
    }
}

impl ClockDriver for Gate {
    fn kind(&self) -> &'static str {
        "gate"
    }

    fn parents(&self) -> &[ClockId] {
        &self.parents
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn gateable(&self) -> bool {
        true
    }

    fn get_rate(&self, cx: &ClockCtx<'_>) -> Result<u32> {
        if self.is_open(cx) {
            cx.parent_rate(self.parent())
        } else {
            Ok(0)
        }
    }

    fn configure(&self, cx: &ClockCtx<'_>, config: &ClockConfig) -> Result<()> {
        let ClockConfig::Gate(on) = *config else {
            return Err(cx.invalid(format!("gate expects Gate, got {config:?}")));
        };
        if self.is_open(cx) == on {
            return Ok(());
        }

        if on {
            let rate = cx.parent_rate(self.parent())?;
            self.enable.set(cx.regs());
            debug!(clock = cx.name(), rate, "ungated");
            cx.announce(rate);
        } else {
            cx.announce(0);
            self.enable.clear(cx.regs());
            debug!(clock = cx.name(), "gated");
        }
        Ok(())
    }

    fn notify(&self, cx: &ClockCtx<'_>, _parent: ClockId, parent_rate: u32) -> Result<NotifyStatus> {
        if !self.is_open(cx) {
            return Ok(NotifyStatus::NoDownstreamConsumers);
        }
        forward(cx, parent_rate)
    }

    fn round_rate(&self, cx: &ClockCtx<'_>, rate: u32, owner: OwnerId) -> Result<u32> {
        if !self.is_open(cx) {
            return Ok(0);
        }
        cx.round_parent(self.parent(), rate, owner)
    }

    fn set_rate(&self, cx: &ClockCtx<'_>, rate: u32, owner: OwnerId) -> Result<u32> {
        if !self.is_open(cx) {
            return Ok(0);
        }
        cx.set_parent(self.parent(), rate, owner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
