/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Clock multiplexer: one of N ordered parents, chosen by a selector field.
//!
//! Rate negotiation scans every parent in order and keeps the one whose
//! achievable rate is closest to the request. Equal distances keep the
//! earlier parent; an exact match ends the scan.

use tracing::{debug, warn};

use crate::drivers::{Capabilities, ClockConfig, ClockDriver};
use crate::error::{ClockError, Result};
use crate::hal::Field;
use crate::tree::{ClockCtx, ClockId, NotifyStatus, OwnerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxConfig {
    pub parents: Vec<ClockId>,
    pub reg: u32,
    pub offset: u8,
    pub width: u8,
}

impl MuxConfig {
    pub fn new(parents: Vec<ClockId>, reg: u32, offset: u8, width: u8) -> Self {
        Self {
            parents,
            reg,
            offset,
            width,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Mux {
    parents: Vec<ClockId>,
    reg: u32,
    field: Field,
}

impl Mux {
    /// # Errors
    /// `Topology` for an empty parent list, a bad selector field, or more
    /// parents than the field can address.
    pub fn new(cfg: MuxConfig) -> Result<Self> {
        let field = Field::new(cfg.offset, cfg.width).ok_or_else(|| {
            ClockError::Topology(format!(
                "mux selector offset {} width {} does not fit a register",
                cfg.offset, cfg.width
            ))
        })?;
        if cfg.parents.is_empty() {
            return Err(ClockError::Topology("mux needs at least one parent".into()));
        }
        if cfg.parents.len() - 1 > field.max_value() as usize {
            return Err(ClockError::Topology(format!(
                "{} mux parents do not fit a {}-bit selector",
                cfg.parents.len(),
                cfg.width
            )));
        }
        Ok(Self {
            parents: cfg.parents,
            reg: cfg.reg,
            field,
        })
    }

    /// Index currently programmed in the selector, validated.
    fn selected(&self, cx: &ClockCtx<'_>) -> Result<usize> {
        let raw = cx.regs().read(self.reg);
        let sel = self.field.get(raw) as usize;
        if sel >= self.parents.len() {
            return Err(cx.io(self.reg, raw, "selector beyond parent list"));
        }
        Ok(sel)
    }

    fn select(&self, cx: &ClockCtx<'_>, index: usize) {
        cx.regs().modify(self.reg, self.field.mask(), self.field.prep(index as u32));
    }

    /// `(index, rate)` of the parent closest to `target`.
    fn best_parent(&self, cx: &ClockCtx<'_>, target: u32, owner: OwnerId) -> Result<(usize, u32)> {
        let mut best: Option<(usize, u32, u32)> = None;
        let mut first_err = None;

        for (index, &parent) in self.parents.iter().enumerate() {
            match cx.round_parent(parent, target, owner) {
                Ok(rate) => {
                    let delta = rate.abs_diff(target);
                    if best.map_or(true, |(_, _, d)| delta < d) {
                        best = Some((index, rate, delta));
                    }
                    if delta == 0 {
                        break;
                    }
                }
                Err(e) => {
                    debug!(clock = cx.name(), index, error = %e, "mux parent cannot provide rate");
                    first_err.get_or_insert(e);
                }
            }
        }

        match (best, first_err) {
            (Some((index, rate, _)), _) => Ok((index, rate)),
            (None, Some(e)) => Err(e),
            (None, None) => Err(cx.invalid("mux has no parents")),
        }
    }

    /// Log whether the parent we just left still feeds anyone else.
    fn probe_previous(&self, cx: &ClockCtx<'_>, previous: Option<usize>, current: usize) {
        let Some(previous) = previous.filter(|&p| p != current) else {
            return;
        };
        let parent = self.parents[previous];
        if self.parents[current] == parent {
            return;
        }
        let tree = cx.tree();
        let result = tree
            .get_rate(parent)
            .and_then(|rate| tree.notify_children(parent, rate));
        match result {
            Ok(NotifyStatus::InUse) => {
                debug!(clock = cx.name(), previous = %parent, "previous parent still in use");
            }
            Ok(status) => {
                debug!(clock = cx.name(), previous = %parent, ?status, "previous parent now idle");
            }
            Err(e) => {
                warn!(clock = cx.name(), previous = %parent, error = %e, "could not probe previous parent");
            }
        }
    }
}

impl ClockDriver for Mux {
    fn kind(&self) -> &'static str {
        "mux"
    }

    fn parents(&self) -> &[ClockId] {
        &self.parents
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn get_rate(&self, cx: &ClockCtx<'_>) -> Result<u32> {
        let sel = self.selected(cx)?;
        cx.parent_rate(self.parents[sel])
    }

    fn configure(&self, cx: &ClockCtx<'_>, config: &ClockConfig) -> Result<()> {
        let ClockConfig::MuxSelect(index) = *config else {
            return Err(cx.invalid(format!("mux expects MuxSelect, got {config:?}")));
        };
        if index >= self.parents.len() {
            return Err(cx.invalid(format!(
                "selector {index} out of range ({} parents)",
                self.parents.len()
            )));
        }
        let previous = self.selected(cx).ok();
        let rate = cx.parent_rate(self.parents[index])?;

        debug!(clock = cx.name(), index, rate, "mux select");
        cx.announce(rate);
        self.select(cx, index);
        self.probe_previous(cx, previous, index);
        Ok(())
    }

    fn notify(&self, cx: &ClockCtx<'_>, parent: ClockId, parent_rate: u32) -> Result<NotifyStatus> {
        let sel = self.selected(cx)?;
        if self.parents[sel] != parent {
            return Ok(NotifyStatus::NotUsingThisParent);
        }
        cx.propagate(parent_rate)
    }

    fn round_rate(&self, cx: &ClockCtx<'_>, rate: u32, owner: OwnerId) -> Result<u32> {
        self.best_parent(cx, rate, owner).map(|(_, r)| r)
    }

    fn set_rate(&self, cx: &ClockCtx<'_>, rate: u32, owner: OwnerId) -> Result<u32> {
        let (index, _) = self.best_parent(cx, rate, owner)?;
        let achieved = cx.set_parent(self.parents[index], rate, owner)?;
        let previous = self.selected(cx).ok();

        self.select(cx, index);
        debug!(clock = cx.name(), requested = rate, index, achieved, "mux set_rate");
        cx.announce(achieved);
        self.probe_previous(cx, previous, index);
        Ok(achieved)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
