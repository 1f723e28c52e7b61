/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Clock node drivers.
//!
//! | Driver | Module | Parents | Capabilities |
//! |---|---|---|---|
//! | `FixedSource` | [`source`] | 0 | round, set |
//! | `SysconSource` | [`source`] | 0 | configure |
//! | `Gate` | [`gate`] | 1 | configure, notify, round, set |
//! | `Divider` | [`div`] | 1 | configure, notify, round, set |
//! | `Frg` | [`frg`] | 1 | configure, notify, round, set |
//! | `Mux` | [`mux`] | n | configure, notify, round, set |
//! | `Pll` | [`pll`] | 1 | configure, notify, (round, set with setpoints) |
//! | `Output` | [`output`] | 1 | configure, notify, round, set |

pub mod div;
pub mod frg;
pub mod gate;
pub mod mux;
pub mod output;
pub mod pll;
pub mod source;

#[cfg(test)]
pub(crate) mod fixtures;

use std::fmt;

use bitflags::bitflags;
use serde::Deserialize;

use crate::error::Result;
use crate::tree::{ClockCtx, ClockId, NotifyStatus, OwnerId};

bitflags! {
    /// Optional operations a driver implements. `get_rate` is always present.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const CONFIGURE  = 1 << 0;
        const NOTIFY     = 1 << 1;
        const ROUND_RATE = 1 << 2;
        const SET_RATE   = 1 << 3;
    }
}

/// Driver-specific data for [`ClockTree::configure`](crate::tree::ClockTree::configure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockConfig {
    /// `true` ungates.
    Gate(bool),
    /// Total division factor `N`, not the raw field value.
    Divider(u32),
    /// FRG multiplier `M` in `0..=255`.
    FrgMult(u32),
    /// Index into the mux's parent list.
    MuxSelect(usize),
    Pll(PllSetting),
    /// Rate request issued by a consumer output on its own behalf.
    Rate(u32),
}

/// Pre-computed PLL register image plus the rate it produces.
///
/// `mdec` is used by PLL1; `sscg0`/`sscg1` by PLL0.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PllSetting {
    pub output_hz: u32,
    #[serde(default)]
    pub ctrl: u32,
    #[serde(default)]
    pub ndec: u32,
    #[serde(default)]
    pub mdec: Option<u32>,
    #[serde(default)]
    pub sscg0: Option<u32>,
    #[serde(default)]
    pub sscg1: Option<u32>,
}

impl PllSetting {
    /// Setting that leaves the PLL powered down.
    pub fn off() -> Self {
        Self {
            output_hz: 0,
            ctrl: 0,
            ndec: 0,
            mdec: None,
            sscg0: None,
            sscg1: None,
        }
    }
}

/// Behaviour of one kind of clock node.
///
/// Only `get_rate` is mandatory. The tree consults [`capabilities`] before
/// dispatching any other operation, so the default bodies are reached only
/// when a driver advertises a capability it does not implement.
///
/// [`capabilities`]: ClockDriver::capabilities
pub trait ClockDriver: Send + Sync + fmt::Debug {
    /// Short kind label used in logs and the rate table.
    fn kind(&self) -> &'static str;

    fn parents(&self) -> &[ClockId];

    fn capabilities(&self) -> Capabilities;

    /// Whether `configure(Gate(false))` is meaningful for this node.
    fn gateable(&self) -> bool {
        false
    }

    fn get_rate(&self, cx: &ClockCtx<'_>) -> Result<u32>;

    fn configure(&self, cx: &ClockCtx<'_>, _config: &ClockConfig) -> Result<()> {
        Err(cx.unsupported("configure"))
    }

    /// `parent`'s output changed to `parent_rate`.
    fn notify(&self, cx: &ClockCtx<'_>, _parent: ClockId, _parent_rate: u32) -> Result<NotifyStatus> {
        Err(cx.unsupported("notify"))
    }

    fn round_rate(&self, cx: &ClockCtx<'_>, _rate: u32, _owner: OwnerId) -> Result<u32> {
        Err(cx.unsupported("round_rate"))
    }

    fn set_rate(&self, cx: &ClockCtx<'_>, _rate: u32, _owner: OwnerId) -> Result<u32> {
        Err(cx.unsupported("set_rate"))
    }
}

/// `rate / divisor` with a zero parent short-circuiting to zero.
pub(crate) fn divide(rate: u32, divisor: u32) -> u32 {
    if rate == 0 || divisor == 0 {
        0
    } else {
        rate / divisor
    }
}
