/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Fractional rate generator (Flexcomm FRG).
//!
//! `rate = parent * 256 / (256 + MULT)`, truncated. The DIV field must
//! always hold `0xFF` (a denominator of 256), so it is rewritten on every
//! update and never read back.

use tracing::debug;

use crate::drivers::{Capabilities, ClockConfig, ClockDriver};
use crate::error::Result;
use crate::hal::Field;
use crate::tree::{ClockCtx, ClockId, NotifyStatus, OwnerId};

const DIV_FIXED: u32 = 0xFF;
const MULT: Field = match Field::new(8, 8) {
    Some(f) => f,
    None => panic!("FRG MULT field"),
};
const MULT_MAX: u32 = 255;

/// Output of an FRG fed `parent` Hz with multiplier `mult`.
pub fn frg_rate(parent: u32, mult: u32) -> u32 {
    (u64::from(parent) * 256 / (256 + u64::from(mult))) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrgConfig {
    pub parent: ClockId,
    pub reg: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Frg {
    parents: [ClockId; 1],
    reg: u32,
}

impl Frg {
    pub fn new(cfg: FrgConfig) -> Self {
        Self {
            parents: [cfg.parent],
            reg: cfg.reg,
        }
    }

    fn parent(&self) -> ClockId {
        self.parents[0]
    }

    fn mult(&self, cx: &ClockCtx<'_>) -> u32 {
        MULT.get(cx.regs().read(self.reg))
    }

    /// `M` bringing `parent` closest to `target`; ties to the smaller `M`.
    fn best_mult(parent: u32, target: u32) -> u32 {
        if target >= parent {
            return 0;
        }
        // parent*256/(256+M) == target  =>  M == 256*parent/target - 256
        let ideal = (u64::from(parent) * 256 / u64::from(target)).saturating_sub(256);
        let lo = ideal.min(u64::from(MULT_MAX)) as u32;
        let hi = (lo + 1).min(MULT_MAX);
        let d_lo = frg_rate(parent, lo).abs_diff(target);
        let d_hi = frg_rate(parent, hi).abs_diff(target);
        if d_hi < d_lo {
            hi
        } else {
            lo
        }
    }

    fn write_mult(&self, cx: &ClockCtx<'_>, mult: u32) {
        cx.regs().write(self.reg, MULT.prep(mult) | DIV_FIXED);
    }
}

impl ClockDriver for Frg {
    fn kind(&self) -> &'static str {
        "frg"
    }

    fn parents(&self) -> &[ClockId] {
        &self.parents
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn get_rate(&self, cx: &ClockCtx<'_>) -> Result<u32> {
        let parent = cx.parent_rate(self.parent())?;
        if parent == 0 {
            return Ok(0);
        }
        Ok(frg_rate(parent, self.mult(cx)))
    }

    fn configure(&self, cx: &ClockCtx<'_>, config: &ClockConfig) -> Result<()> {
        let ClockConfig::FrgMult(mult) = *config else {
            return Err(cx.invalid(format!("frg expects FrgMult, got {config:?}")));
        };
        if mult > MULT_MAX {
            return Err(cx.invalid(format!("multiplier {mult} exceeds {MULT_MAX}")));
        }
        let rate = frg_rate(cx.parent_rate(self.parent())?, mult);
        debug!(clock = cx.name(), mult, rate, "frg configure");
        cx.announce(rate);
        self.write_mult(cx, mult);
        Ok(())
    }

    fn notify(&self, cx: &ClockCtx<'_>, _parent: ClockId, parent_rate: u32) -> Result<NotifyStatus> {
        cx.propagate(frg_rate(parent_rate, self.mult(cx)))
    }

    fn round_rate(&self, cx: &ClockCtx<'_>, rate: u32, owner: OwnerId) -> Result<u32> {
        if rate == 0 {
            return Err(cx.invalid("cannot generate 0 Hz"));
        }
        let parent = cx.round_parent(self.parent(), rate, owner)?;
        Ok(frg_rate(parent, Self::best_mult(parent, rate)))
    }

    fn set_rate(&self, cx: &ClockCtx<'_>, rate: u32, owner: OwnerId) -> Result<u32> {
        if rate == 0 {
            return Err(cx.invalid("cannot generate 0 Hz"));
        }
        let parent = cx.set_parent(self.parent(), rate, owner)?;
        let mult = Self::best_mult(parent, rate);
        let achieved = frg_rate(parent, mult);
        debug!(clock = cx.name(), requested = rate, mult, achieved, "frg set_rate");
        cx.announce(achieved);
        self.write_mult(cx, mult);
        Ok(achieved)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
