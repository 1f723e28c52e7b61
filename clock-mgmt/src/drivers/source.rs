/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Root clock sources: fixed oscillators and syscon-gated sources.

use tracing::debug;

use crate::drivers::{Capabilities, ClockConfig, ClockDriver};
use crate::error::Result;
use crate::hal::BitRef;
use crate::tree::{ClockCtx, ClockId, OwnerId};

// ── Fixed source ──────────────────────────────────────────────────────────────

/// An always-running oscillator of known frequency.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource {
    rate: u32,
}

impl FixedSource {
    pub fn new(rate: u32) -> Self {
        Self { rate }
    }
}

impl ClockDriver for FixedSource {
    fn kind(&self) -> &'static str {
        "fixed"
    }

    fn parents(&self) -> &[ClockId] {
        &[]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ROUND_RATE | Capabilities::SET_RATE
    }

    fn get_rate(&self, _cx: &ClockCtx<'_>) -> Result<u32> {
        Ok(self.rate)
    }

    fn round_rate(&self, _cx: &ClockCtx<'_>, _rate: u32, _owner: OwnerId) -> Result<u32> {
        Ok(self.rate)
    }

    fn set_rate(&self, _cx: &ClockCtx<'_>, _rate: u32, _owner: OwnerId) -> Result<u32> {
        Ok(self.rate)
    }
}

// ── Syscon source ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct SysconSourceConfig {
    pub rate: u32,
    /// Set while the source runs.
    pub enable: Option<BitRef>,
    /// Set while the source is powered down.
    pub power_down: Option<BitRef>,
}

/// An on-chip oscillator with an enable bit and, optionally, a power-down
/// bit in the power-management block.
///
/// Without any register the source is always on.
#[derive(Debug, Clone, Copy)]
pub struct SysconSource {
    cfg: SysconSourceConfig,
}

impl SysconSource {
    pub fn new(cfg: SysconSourceConfig) -> Self {
        Self { cfg }
    }

    fn is_running(&self, cx: &ClockCtx<'_>) -> bool {
        let regs = cx.regs();
        let enabled = self.cfg.enable.map_or(true, |b| b.is_set(regs));
        let powered = self.cfg.power_down.map_or(true, |b| !b.is_set(regs));
        enabled && powered
    }
}

impl ClockDriver for SysconSource {
    fn kind(&self) -> &'static str {
        "source"
    }

    fn parents(&self) -> &[ClockId] {
        &[]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CONFIGURE
    }

    fn gateable(&self) -> bool {
        self.cfg.enable.is_some() || self.cfg.power_down.is_some()
    }

    fn get_rate(&self, cx: &ClockCtx<'_>) -> Result<u32> {
        Ok(if self.is_running(cx) { self.cfg.rate } else { 0 })
    }

    fn configure(&self, cx: &ClockCtx<'_>, config: &ClockConfig) -> Result<()> {
        let ClockConfig::Gate(on) = *config else {
            return Err(cx.invalid(format!("source expects Gate, got {config:?}")));
        };
        if !self.gateable() || self.is_running(cx) == on {
            return Ok(());
        }

        let regs = cx.regs();
        if on {
            if let Some(pd) = self.cfg.power_down {
                pd.clear(regs);
            }
            if let Some(en) = self.cfg.enable {
                en.set(regs);
            }
            debug!(clock = cx.name(), rate = self.cfg.rate, "source enabled");
            cx.announce(self.cfg.rate);
        } else {
            cx.announce(0);
            if let Some(en) = self.cfg.enable {
                en.clear(regs);
            }
            if let Some(pd) = self.cfg.power_down {
                pd.set(regs);
            }
            debug!(clock = cx.name(), "source disabled");
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
