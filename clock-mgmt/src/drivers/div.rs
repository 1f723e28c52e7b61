/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Integer divider.
//!
//! The division factor is derived from a register field as
//! `N = field * scale + bias`, which covers the three divider shapes found
//! on the SoC:
//!
//! | Shape | scale | bias | strobe |
//! |---|---|---|---|
//! | syscon divider | 1 | 1 | none |
//! | RTC divider | 1 | `add_factor` | none |
//! | PLL post-divider (PDEC) | 2 | 0 | PREQ |

use tracing::debug;

use crate::drivers::{divide, Capabilities, ClockConfig, ClockDriver};
use crate::error::{ClockError, Result};
use crate::hal::Field;
use crate::tree::{ClockCtx, ClockId, NotifyStatus, OwnerId};

/// PDEC.PDIV occupies bits [4:0].
const PDEC_PDIV_WIDTH: u8 = 5;
/// PDEC.PREQ, set on every write to latch the new divider.
const PDEC_PREQ: u32 = 1 << 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DividerConfig {
    pub parent: ClockId,
    pub reg: u32,
    pub offset: u8,
    pub width: u8,
    pub scale: u32,
    pub bias: u32,
    /// Bits OR-ed into every write.
    pub strobe: u32,
}

impl DividerConfig {
    /// `N = field + 1`.
    pub fn plain(parent: ClockId, reg: u32, offset: u8, width: u8) -> Self {
        Self {
            parent,
            reg,
            offset,
            width,
            scale: 1,
            bias: 1,
            strobe: 0,
        }
    }

    /// `N = field + add_factor`.
    pub fn rtc(parent: ClockId, reg: u32, offset: u8, width: u8, add_factor: u32) -> Self {
        Self {
            bias: add_factor,
            ..Self::plain(parent, reg, offset, width)
        }
    }

    /// `N = PDIV * 2`, latched with PREQ.
    pub fn pdec(parent: ClockId, reg: u32) -> Self {
        Self {
            parent,
            reg,
            offset: 0,
            width: PDEC_PDIV_WIDTH,
            scale: 2,
            bias: 0,
            strobe: PDEC_PREQ,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Divider {
    parents: [ClockId; 1],
    reg: u32,
    field: Field,
    scale: u32,
    bias: u32,
    strobe: u32,
}

impl Divider {
    /// # Errors
    /// `Topology` for a field that does not fit a 32-bit register, or a
    /// shape that can only ever divide by zero.
    pub fn new(cfg: DividerConfig) -> Result<Self> {
        let field = Field::new(cfg.offset, cfg.width).ok_or_else(|| {
            ClockError::Topology(format!(
                "divider field offset {} width {} does not fit a register",
                cfg.offset, cfg.width
            ))
        })?;
        if cfg.scale == 0 && cfg.bias == 0 {
            return Err(ClockError::Topology("divider scale and bias are both zero".into()));
        }
        Ok(Self {
            parents: [cfg.parent],
            reg: cfg.reg,
            field,
            scale: cfg.scale,
            bias: cfg.bias,
            strobe: cfg.strobe,
        })
    }

    fn parent(&self) -> ClockId {
        self.parents[0]
    }

    fn divisor_of(&self, field: u32) -> u64 {
        u64::from(field) * u64::from(self.scale) + u64::from(self.bias)
    }

    /// Field value that encodes divisor `n`, if any.
    fn field_for(&self, n: u32) -> Option<u32> {
        let n = u64::from(n);
        let bias = u64::from(self.bias);
        if n == 0 || n < bias {
            return None;
        }
        let field = if self.scale == 0 {
            if n != bias {
                return None;
            }
            0
        } else {
            let scale = u64::from(self.scale);
            if (n - bias) % scale != 0 {
                return None;
            }
            (n - bias) / scale
        };
        (field <= u64::from(self.field.max_value())).then_some(field as u32)
    }

    /// Divisor currently held in the register.
    fn current_divisor(&self, cx: &ClockCtx<'_>) -> Result<u64> {
        let raw = cx.regs().read(self.reg);
        let n = self.divisor_of(self.field.get(raw));
        if n == 0 {
            return Err(cx.io(self.reg, raw, "divisor evaluates to zero"));
        }
        Ok(n)
    }

    /// Representable `(field, divisor)` bringing `parent` closest to `target`.
    /// Ties go to the smaller divisor.
    fn best_divisor(&self, parent: u32, target: u32) -> Option<(u32, u64)> {
        let max = u64::from(self.field.max_value());
        let ideal = (u64::from(parent) / u64::from(target)).max(1);
        let bias = u64::from(self.bias);
        let base = match self.scale {
            0 => 0,
            s if ideal > bias => ((ideal - bias) / u64::from(s)).min(max),
            _ => 0,
        };

        let mut best: Option<(u32, u64, u64)> = None;
        for field in base.saturating_sub(1)..=(base + 1).min(max) {
            let n = self.divisor_of(field as u32);
            if n == 0 {
                continue;
            }
            let delta = (u64::from(parent) / n).abs_diff(u64::from(target));
            if best.map_or(true, |(_, _, d)| delta < d) {
                best = Some((field as u32, n, delta));
            }
        }
        best.map(|(field, n, _)| (field, n))
    }

    fn write_field(&self, cx: &ClockCtx<'_>, field: u32) {
        cx.regs()
            .modify(self.reg, self.field.mask() | self.strobe, self.field.prep(field) | self.strobe);
    }

    fn check_target(&self, cx: &ClockCtx<'_>, rate: u32) -> Result<()> {
        if rate == 0 {
            Err(cx.invalid("cannot divide to 0 Hz"))
        } else {
            Ok(())
        }
    }
}

impl ClockDriver for Divider {
    fn kind(&self) -> &'static str {
        "divider"
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
        let n = self.current_divisor(cx)?;
        Ok((u64::from(parent) / n) as u32)
    }

    fn configure(&self, cx: &ClockCtx<'_>, config: &ClockConfig) -> Result<()> {
        let ClockConfig::Divider(n) = *config else {
            return Err(cx.invalid(format!("divider expects Divider, got {config:?}")));
        };
        let field = self
            .field_for(n)
            .ok_or_else(|| cx.invalid(format!("divisor {n} is not representable")))?;
        let rate = divide(cx.parent_rate(self.parent())?, n);

        debug!(clock = cx.name(), divisor = n, rate, "divider configure");
        cx.announce(rate);
        self.write_field(cx, field);
        Ok(())
    }

    fn notify(&self, cx: &ClockCtx<'_>, _parent: ClockId, parent_rate: u32) -> Result<NotifyStatus> {
        if parent_rate == 0 {
            return cx.propagate(0);
        }
        let n = self.current_divisor(cx)?;
        cx.propagate((u64::from(parent_rate) / n) as u32)
    }

    fn round_rate(&self, cx: &ClockCtx<'_>, rate: u32, owner: OwnerId) -> Result<u32> {
        self.check_target(cx, rate)?;
        let parent = cx.round_parent(self.parent(), rate, owner)?;
        if parent == 0 {
            return Ok(0);
        }
        let (_, n) = self
            .best_divisor(parent, rate)
            .ok_or_else(|| cx.invalid("no representable divisor"))?;
        Ok((u64::from(parent) / n) as u32)
    }

    fn set_rate(&self, cx: &ClockCtx<'_>, rate: u32, owner: OwnerId) -> Result<u32> {
        self.check_target(cx, rate)?;
        let parent = cx.set_parent(self.parent(), rate, owner)?;
        if parent == 0 {
            return Ok(0);
        }
        let (field, n) = self
            .best_divisor(parent, rate)
            .ok_or_else(|| cx.invalid("no representable divisor"))?;
        let achieved = (u64::from(parent) / n) as u32;

        debug!(clock = cx.name(), requested = rate, divisor = n, achieved, "divider set_rate");
        cx.announce(achieved);
        self.write_field(cx, field);
        Ok(achieved)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::fixtures::Fixture;
    use crate::drivers::output::Output;
    use crate::drivers::source::FixedSource;
    use crate::hal::MemoryRegisters;
    use crate::tree::ClockTree;
    use proptest::prelude::*;
    use std::sync::Arc;

    const DIV_REG: u32 = 0x4000_0380;
    const RTC_REG: u32 = 0x4000_0400;
    const PDEC_REG: u32 = 0x4000_058C;

    fn divider_over(
        parent_hz: u32,
        cfg: impl FnOnce(ClockId) -> DividerConfig,
    ) -> (ClockTree, Arc<MemoryRegisters>, ClockId) {
        let mut fx = Fixture::new();
        let src = fx.add("src", FixedSource::new(parent_hz));
        let div = fx.add("div", Divider::new(cfg(src)).unwrap());
        fx.add("sink", Output::new(div));
        let regs = fx.regs.clone();
        (fx.build(), regs, div)
    }

    #[test]
    fn plain_divider_reads_field_plus_one() {
        let (tree, regs, div) = divider_over(96_000_000, |p| DividerConfig::plain(p, DIV_REG, 0, 8));
        assert_eq!(tree.get_rate(div).unwrap(), 96_000_000);
        regs.preset(DIV_REG, 3);
        assert_eq!(tree.get_rate(div).unwrap(), 24_000_000);
    }

    #[test]
    fn configure_writes_n_minus_one_and_keeps_other_bits() {
        let (tree, regs, div) = divider_over(96_000_000, |p| DividerConfig::plain(p, DIV_REG, 0, 8));
        regs.preset(DIV_REG, 0xA000_0000);
        tree.configure(div, &ClockConfig::Divider(4)).unwrap();
        assert_eq!(regs.peek(DIV_REG), 0xA000_0003);
    }

    #[test]
    fn configure_announces_new_rate_before_write() {
        let (tree, regs, div) = divider_over(96_000_000, |p| DividerConfig::plain(p, DIV_REG, 0, 8));
        let sink = tree.find("sink").unwrap();
        let field_at_notify = Arc::new(parking_lot::Mutex::new(Vec::new()));
        {
            let field_at_notify = field_at_notify.clone();
            let regs = regs.clone();
            tree.subscribe(sink, move |c| field_at_notify.lock().push((c.rate, regs.peek(DIV_REG))))
                .unwrap();
        }
        tree.configure(div, &ClockConfig::Divider(2)).unwrap();
        assert_eq!(*field_at_notify.lock(), vec![(48_000_000, 0)]);
        assert_eq!(tree.recorded_rate(sink), Some(48_000_000));
    }

    #[test]
    fn unrepresentable_divisor_is_rejected_without_write() {
        let (tree, regs, div) = divider_over(96_000_000, |p| DividerConfig::plain(p, DIV_REG, 0, 4));
        for n in [0, 17] {
            let err = tree.configure(div, &ClockConfig::Divider(n)).unwrap_err();
            assert!(matches!(err, ClockError::InvalidArgument { .. }), "N={n}");
        }
        assert!(regs.writes().is_empty());
    }

    #[test]
    fn zero_parent_yields_zero_without_reading_field() {
        let (tree, regs, div) = divider_over(0, |p| DividerConfig::pdec(p, PDEC_REG));
        assert_eq!(tree.get_rate(div).unwrap(), 0);
        assert_eq!(regs.read_count(PDEC_REG), 0);
    }

    #[test]
    fn rtc_divider_uses_additive_factor() {
        let (tree, regs, div) = divider_over(32_768, |p| DividerConfig::rtc(p, RTC_REG, 0, 5, 1));
        regs.preset(RTC_REG, 31);
        assert_eq!(tree.get_rate(div).unwrap(), 1_024);

        let (tree, regs, div) = divider_over(32_768, |p| DividerConfig::rtc(p, RTC_REG, 16, 4, 2));
        tree.configure(div, &ClockConfig::Divider(2)).unwrap();
        assert_eq!(regs.peek(RTC_REG), 0);
        assert_eq!(tree.get_rate(div).unwrap(), 16_384);
        tree.configure(div, &ClockConfig::Divider(10)).unwrap();
        assert_eq!(regs.peek(RTC_REG), 8 << 16);
        assert!(tree.configure(div, &ClockConfig::Divider(1)).is_err());
    }

    #[test]
    fn pdec_zero_field_is_io_error() {
        let (tree, _, div) = divider_over(150_000_000, |p| DividerConfig::pdec(p, PDEC_REG));
        assert!(matches!(tree.get_rate(div), Err(ClockError::Io { addr: PDEC_REG, .. })));
    }

    #[test]
    fn pdec_writes_half_divisor_with_request_strobe() {
        let (tree, regs, div) = divider_over(300_000_000, |p| DividerConfig::pdec(p, PDEC_REG));
        tree.configure(div, &ClockConfig::Divider(4)).unwrap();
        assert_eq!(regs.peek(PDEC_REG), 2 | PDEC_PREQ);
        assert_eq!(tree.get_rate(div).unwrap(), 75_000_000);
        assert!(tree.configure(div, &ClockConfig::Divider(3)).is_err(), "odd divisor");
    }

    #[test]
    fn round_rate_picks_closest_divisor() {
        let (tree, _, div) = divider_over(96_000_000, |p| DividerConfig::plain(p, DIV_REG, 0, 8));
        let me = OwnerId::Consumer(1);
        // 96/7 = 13.71 MHz is closer to 13 MHz than 96/8 = 12 MHz.
        assert_eq!(tree.round_rate(div, 13_000_000, me).unwrap(), 13_714_285);
        assert_eq!(tree.round_rate(div, 48_000_000, me).unwrap(), 48_000_000);
        // Above the parent rate N = 1 is the best that exists.
        assert_eq!(tree.round_rate(div, 200_000_000, me).unwrap(), 96_000_000);
        // Below the field range the largest divisor wins.
        assert_eq!(tree.round_rate(div, 1, me).unwrap(), 96_000_000 / 256);
        assert!(tree.round_rate(div, 0, me).is_err());
    }

    #[test]
    fn set_rate_programs_divider_and_notifies() {
        let (tree, regs, div) = divider_over(96_000_000, |p| DividerConfig::plain(p, DIV_REG, 0, 8));
        let sink = tree.find("sink").unwrap();
        let me = OwnerId::Consumer(3);
        assert_eq!(tree.set_rate(div, 12_000_000, me).unwrap(), 12_000_000);
        assert_eq!(regs.peek(DIV_REG), 7);
        assert_eq!(tree.recorded_rate(sink), Some(12_000_000));
        assert_eq!(tree.owner(div), Some(me));
    }

    #[test]
    fn parent_change_recomputes_through_current_divisor() {
        let (tree, regs, div) = divider_over(96_000_000, |p| DividerConfig::plain(p, DIV_REG, 0, 8));
        regs.preset(DIV_REG, 1);
        let src = tree.find("src").unwrap();
        tree.notify_children(src, 50_000_000).unwrap();
        assert_eq!(tree.recorded_rate(div), Some(25_000_000));
        assert_eq!(tree.recorded_rate(tree.find("sink").unwrap()), Some(25_000_000));
    }

    proptest! {
        #[test]
        fn get_rate_is_parent_over_n_for_every_representable_n(
            parent in 1u32..=u32::MAX,
            width in 1u8..=8,
            pick in any::<u32>(),
        ) {
            let n = pick % (1u32 << width) + 1;
            let (tree, _, div) = divider_over(parent, |p| DividerConfig::plain(p, DIV_REG, 0, width));
            tree.configure(div, &ClockConfig::Divider(n)).unwrap();
            prop_assert_eq!(tree.get_rate(div).unwrap(), parent / n);
        }
    }
}
