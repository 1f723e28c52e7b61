/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! LPC55Sxx PLL0 / PLL1.
//!
//! The PLL does not compute its output from register contents: each
//! [`PllSetting`] carries a precomputed register image together with the
//! frequency it produces, and that frequency is what `get_rate` reports
//! once the PLL has locked.
//!
//! ```text
//! PoweredDown ──configure(hz>0)──► Configuring ──power up──► Locking ──► Locked
//!      ▲                                                                  │
//!      └──────────────── configure(0) / lock timeout ─────────────────────┘
//! ```
//!
//! Register map (offsets from the PLL base):
//!
//! | Offset | PLL0 | PLL1 |
//! |---|---|---|
//! | 0x00 | CTRL | CTRL |
//! | 0x04 | STAT | STAT |
//! | 0x08 | NDEC | NDEC |
//! | 0x0C | PDEC | MDEC |
//! | 0x10 | SSCG0 | PDEC |
//! | 0x14 | SSCG1 | |

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::drivers::{Capabilities, ClockConfig, ClockDriver, PllSetting};
use crate::error::{ClockError, Result};
use crate::hal::poll_until;
use crate::tree::{ClockCtx, ClockId, NotifyStatus, OwnerId};

const CTRL: u32 = 0x00;
const STAT: u32 = 0x04;
const NDEC: u32 = 0x08;
const PLL0_SSCG0: u32 = 0x10;
const PLL0_SSCG1: u32 = 0x14;
const PLL1_MDEC: u32 = 0x0C;

const CTRL_BYPASSPREDIV: u32 = 1 << 19;
const STAT_LOCK: u32 = 1 << 0;
const NDEC_NDIV: u32 = 0xFF;
const NDEC_NREQ: u32 = 1 << 8;
const SSCG1_MD_REQ: u32 = 1 << 1;
const SSCG1_MREQ: u32 = 1 << 26;
const SSCG1_SEL_EXT: u32 = 1 << 28;
const MDEC_MREQ: u32 = 1 << 16;

/// Lock bit is only trustworthy for a reference strictly inside this band.
const LOCK_REF_MIN_HZ: u32 = 100_000;
const LOCK_REF_MAX_HZ: u32 = 20_000_000;
/// Settling wait when the lock bit cannot be trusted.
pub const UNLOCKED_SETTLE_US: u32 = 6_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PllVariant {
    /// Spread-spectrum capable, programmed through SSCG0/SSCG1.
    Pll0,
    /// Programmed through MDEC.
    Pll1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PllConfig {
    pub parent: ClockId,
    pub variant: PllVariant,
    pub base: u32,
    /// PMC run-configuration register holding the power-down bits.
    pub power_reg: u32,
    /// Bits set to power the PLL (and, for PLL0, its SSCG) down.
    pub power_down_mask: u32,
    /// Upper bound on lock polls; `None` spins until the bit sets.
    pub lock_poll_limit: Option<u32>,
    /// Settings offered to `round_rate` / `set_rate`.
    pub setpoints: Vec<PllSetting>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PllPhase {
    PoweredDown,
    Configuring,
    Locking,
    Locked,
}

#[derive(Debug)]
struct PllState {
    phase: PllPhase,
    output: u32,
}

#[derive(Debug)]
pub struct Pll {
    parents: [ClockId; 1],
    cfg: PllConfig,
    state: Mutex<PllState>,
}

impl Pll {
    /// # Errors
    /// `Topology` if any setpoint lacks the registers its variant needs.
    pub fn new(cfg: PllConfig) -> Result<Self> {
        for sp in &cfg.setpoints {
            if let Some(missing) = missing_register(cfg.variant, sp) {
                return Err(ClockError::Topology(format!(
                    "PLL setpoint {} Hz lacks {missing}",
                    sp.output_hz
                )));
            }
        }
        Ok(Self {
            parents: [cfg.parent],
            cfg,
            state: Mutex::new(PllState {
                phase: PllPhase::PoweredDown,
                output: 0,
            }),
        })
    }

    pub fn phase(&self) -> PllPhase {
        self.state.lock().phase
    }

    fn set_state(&self, phase: PllPhase, output: u32) {
        let mut st = self.state.lock();
        st.phase = phase;
        st.output = output;
    }

    fn reg(&self, offset: u32) -> u32 {
        self.cfg.base + offset
    }

    fn power_down(&self, cx: &ClockCtx<'_>) {
        cx.regs().modify(self.cfg.power_reg, 0, self.cfg.power_down_mask);
    }

    fn power_up(&self, cx: &ClockCtx<'_>) {
        cx.regs().modify(self.cfg.power_reg, self.cfg.power_down_mask, 0);
    }

    fn program(&self, cx: &ClockCtx<'_>, s: &PllSetting) {
        let regs = cx.regs();
        regs.write(self.reg(CTRL), s.ctrl);
        regs.write(self.reg(NDEC), s.ndec);
        regs.write(self.reg(NDEC), s.ndec | NDEC_NREQ);
        match self.cfg.variant {
            PllVariant::Pll0 => {
                let sscg1 = s.sscg1.unwrap_or_default();
                regs.write(self.reg(PLL0_SSCG0), s.sscg0.unwrap_or_default());
                regs.write(self.reg(PLL0_SSCG1), sscg1);
                regs.write(self.reg(PLL0_SSCG1), sscg1 | SSCG1_MD_REQ | SSCG1_MREQ);
            }
            PllVariant::Pll1 => {
                let mdec = s.mdec.unwrap_or_default();
                regs.write(self.reg(PLL1_MDEC), mdec);
                regs.write(self.reg(PLL1_MDEC), mdec | MDEC_MREQ);
            }
        }
    }

    /// Whether STAT.LOCK can be relied on for this setting.
    fn lock_bit_reliable(&self, parent_hz: u32, s: &PllSetting) -> bool {
        let reference = if s.ctrl & CTRL_BYPASSPREDIV != 0 {
            parent_hz
        } else {
            parent_hz / (s.ndec & NDEC_NDIV).max(1)
        };
        let spread = self.cfg.variant == PllVariant::Pll0
            && s.sscg1.unwrap_or_default() & SSCG1_SEL_EXT == 0;
        !spread && reference > LOCK_REF_MIN_HZ && reference < LOCK_REF_MAX_HZ
    }

    fn apply(&self, cx: &ClockCtx<'_>, s: &PllSetting) -> Result<u32> {
        if let Some(missing) = missing_register(self.cfg.variant, s) {
            return Err(cx.invalid(format!("setting lacks {missing}")));
        }

        self.set_state(PllPhase::Configuring, 0);
        self.power_down(cx);

        if s.output_hz == 0 {
            self.set_state(PllPhase::PoweredDown, 0);
            debug!(clock = cx.name(), "PLL powered down");
            cx.announce(0);
            return Ok(0);
        }

        self.program(cx, s);
        self.power_up(cx);
        self.set_state(PllPhase::Locking, 0);

        let parent_hz = match cx.parent_rate(self.parents[0]) {
            Ok(hz) => hz,
            Err(e) => {
                self.abort(cx);
                return Err(e);
            }
        };

        if self.lock_bit_reliable(parent_hz, s) {
            let stat = self.reg(STAT);
            let regs = cx.regs();
            match poll_until(|| regs.read(stat) & STAT_LOCK != 0, self.cfg.lock_poll_limit) {
                Ok(polls) => debug!(clock = cx.name(), polls, "PLL locked"),
                Err(timeout) => {
                    let value = regs.read(stat);
                    warn!(clock = cx.name(), polls = timeout.polls, "PLL failed to lock");
                    self.abort(cx);
                    return Err(cx.io(stat, value, "PLL did not lock"));
                }
            }
        } else {
            debug!(clock = cx.name(), us = UNLOCKED_SETTLE_US, "lock bit unreliable, waiting");
            cx.delay().delay_us(UNLOCKED_SETTLE_US);
        }

        self.set_state(PllPhase::Locked, s.output_hz);
        debug!(clock = cx.name(), rate = s.output_hz, "PLL running");
        cx.announce(s.output_hz);
        Ok(s.output_hz)
    }

    fn abort(&self, cx: &ClockCtx<'_>) {
        self.power_down(cx);
        self.set_state(PllPhase::PoweredDown, 0);
        cx.announce(0);
    }

    /// Closest setpoint to `target`; ties keep the earlier one.
    fn closest_setpoint(&self, target: u32) -> Option<&PllSetting> {
        self.cfg
            .setpoints
            .iter()
            .reduce(|best, sp| {
                if sp.output_hz.abs_diff(target) < best.output_hz.abs_diff(target) {
                    sp
                } else {
                    best
                }
            })
    }
}

fn missing_register(variant: PllVariant, s: &PllSetting) -> Option<&'static str> {
    if s.output_hz == 0 {
        return None;
    }
    match variant {
        PllVariant::Pll0 if s.sscg0.is_none() => Some("sscg0"),
        PllVariant::Pll0 if s.sscg1.is_none() => Some("sscg1"),
        PllVariant::Pll1 if s.mdec.is_none() => Some("mdec"),
        _ => None,
    }
}

impl ClockDriver for Pll {
    fn kind(&self) -> &'static str {
        match self.cfg.variant {
            PllVariant::Pll0 => "pll0",
            PllVariant::Pll1 => "pll1",
        }
    }

    fn parents(&self) -> &[ClockId] {
        &self.parents
    }

    fn capabilities(&self) -> Capabilities {
        let base = Capabilities::CONFIGURE | Capabilities::NOTIFY;
        if self.cfg.setpoints.is_empty() {
            base
        } else {
            base | Capabilities::ROUND_RATE | Capabilities::SET_RATE
        }
    }

    fn get_rate(&self, _cx: &ClockCtx<'_>) -> Result<u32> {
        let st = self.state.lock();
        Ok(if st.phase == PllPhase::Locked { st.output } else { 0 })
    }

    fn configure(&self, cx: &ClockCtx<'_>, config: &ClockConfig) -> Result<()> {
        let ClockConfig::Pll(setting) = config else {
            return Err(cx.invalid(format!("pll expects Pll, got {config:?}")));
        };
        self.apply(cx, setting).map(|_| ())
    }

    fn notify(&self, cx: &ClockCtx<'_>, _parent: ClockId, _parent_rate: u32) -> Result<NotifyStatus> {
        let output = self.get_rate(cx)?;
        if output == 0 {
            return Ok(NotifyStatus::NoDownstreamConsumers);
        }
        cx.propagate(output)
    }

    fn round_rate(&self, cx: &ClockCtx<'_>, rate: u32, _owner: OwnerId) -> Result<u32> {
        self.closest_setpoint(rate)
            .map(|sp| sp.output_hz)
            .ok_or_else(|| cx.unsupported("round_rate"))
    }

    fn set_rate(&self, cx: &ClockCtx<'_>, rate: u32, _owner: OwnerId) -> Result<u32> {
        let setting = self
            .closest_setpoint(rate)
            .cloned()
            .ok_or_else(|| cx.unsupported("set_rate"))?;
        if self.phase() == PllPhase::Locked && self.get_rate(cx)? == setting.output_hz {
            return Ok(setting.output_hz);
        }
        self.apply(cx, &setting)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
