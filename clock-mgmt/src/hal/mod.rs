/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Hardware access seams used by the clock drivers.
//!
//! ```text
//! drivers ──► RegisterBlock (read / write / modify by address)
//!         ──► Delay         (fixed settling waits)
//!         ──► poll_until    (bounded or unbounded status polling)
//! ```
//!
//! Drivers never dereference raw addresses. They go through a
//! [`RegisterBlock`], which on a real target wraps volatile MMIO and on the
//! host is the [`MemoryRegisters`] mirror.

pub mod poll;

pub use poll::{poll_until, Delay, PollTimeout, RecordingDelay, StdDelay};

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tracing::trace;

// ── Register access ───────────────────────────────────────────────────────────

/// 32-bit register access by absolute address.
pub trait RegisterBlock: Send + Sync + fmt::Debug {
    fn read(&self, addr: u32) -> u32;

    fn write(&self, addr: u32, value: u32);

    /// Read-modify-write: clears `clear`, then sets `set`.
    fn modify(&self, addr: u32, clear: u32, set: u32) {
        let value = self.read(addr);
        self.write(addr, (value & !clear) | set);
    }
}

/// In-memory register mirror.
///
/// Unwritten addresses read as `0`. Every write is appended to a log and
/// every read is counted per address, so tests can assert on exact hardware
/// traffic (e.g. "the lock status register was never polled").
#[derive(Debug, Default)]
pub struct MemoryRegisters {
    inner: Mutex<Mirror>,
}

#[derive(Debug, Default)]
struct Mirror {
    values: HashMap<u32, u32>,
    writes: Vec<(u32, u32)>,
    reads: HashMap<u32, usize>,
}

impl MemoryRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mirror seeded with initial register contents.
    pub fn with_values(values: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let regs = Self::new();
        for (addr, value) in values {
            regs.preset(addr, value);
        }
        regs
    }

    /// Set a register without logging a write, as if hardware changed it.
    pub fn preset(&self, addr: u32, value: u32) {
        self.inner.lock().values.insert(addr, value);
    }

    /// Current value without counting a read.
    pub fn peek(&self, addr: u32) -> u32 {
        self.inner.lock().values.get(&addr).copied().unwrap_or(0)
    }

    /// All writes since creation (or the last [`clear_log`](Self::clear_log)).
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.inner.lock().writes.clone()
    }

    /// Writes that targeted `addr`, oldest first.
    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.inner
            .lock()
            .writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    /// How many times `addr` has been read through [`RegisterBlock::read`].
    pub fn read_count(&self, addr: u32) -> usize {
        self.inner.lock().reads.get(&addr).copied().unwrap_or(0)
    }

    pub fn clear_log(&self) {
        let mut inner = self.inner.lock();
        inner.writes.clear();
        inner.reads.clear();
    }
}

impl RegisterBlock for MemoryRegisters {
    fn read(&self, addr: u32) -> u32 {
        let mut inner = self.inner.lock();
        *inner.reads.entry(addr).or_insert(0) += 1;
        inner.values.get(&addr).copied().unwrap_or(0)
    }

    fn write(&self, addr: u32, value: u32) {
        trace!("reg write {addr:#010x} <- {value:#010x}");
        let mut inner = self.inner.lock();
        inner.values.insert(addr, value);
        inner.writes.push((addr, value));
    }
}

// ── Bit fields ────────────────────────────────────────────────────────────────

/// A contiguous bit field inside a 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    offset: u8,
    width: u8,
}

impl Field {
    /// Returns `None` unless `1 <= width` and `offset + width <= 32`.
    pub const fn new(offset: u8, width: u8) -> Option<Self> {
        if width == 0 || offset as u32 + width as u32 > 32 {
            None
        } else {
            Some(Self { offset, width })
        }
    }

    pub fn offset(&self) -> u8 {
        self.offset
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// Largest value the field can hold.
    pub fn max_value(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        }
    }

    /// The field's bits in register position.
    pub fn mask(&self) -> u32 {
        self.max_value() << self.offset
    }

    /// Extract the field from a register value.
    pub fn get(&self, reg: u32) -> u32 {
        (reg & self.mask()) >> self.offset
    }

    /// Shift `value` into position, truncating to the field width.
    pub fn prep(&self, value: u32) -> u32 {
        (value & self.max_value()) << self.offset
    }

    /// `reg` with the field replaced by `value`.
    pub fn insert(&self, reg: u32, value: u32) -> u32 {
        (reg & !self.mask()) | self.prep(value)
    }
}

/// A single bit at a register address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRef {
    pub reg: u32,
    bit: u8,
}

impl BitRef {
    /// Returns `None` for `bit >= 32`.
    pub const fn new(reg: u32, bit: u8) -> Option<Self> {
        if bit >= 32 {
            None
        } else {
            Some(Self { reg, bit })
        }
    }

    pub fn mask(&self) -> u32 {
        1u32 << self.bit
    }

    pub fn is_set(&self, regs: &dyn RegisterBlock) -> bool {
        regs.read(self.reg) & self.mask() != 0
    }

    pub fn set(&self, regs: &dyn RegisterBlock) {
        regs.modify(self.reg, 0, self.mask());
    }

    pub fn clear(&self, regs: &dyn RegisterBlock) {
        regs.modify(self.reg, self.mask(), 0);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_register_reads_zero() {
        let regs = MemoryRegisters::new();
        assert_eq!(regs.read(0x4000_0000), 0);
        assert_eq!(regs.read_count(0x4000_0000), 1);
    }

    #[test]
    fn preset_is_not_logged_as_write() {
        let regs = MemoryRegisters::with_values([(0x10, 0xAB)]);
        assert_eq!(regs.peek(0x10), 0xAB);
        assert!(regs.writes().is_empty());
        assert_eq!(regs.read_count(0x10), 0, "peek must not count as a read");
    }

    #[test]
    fn modify_clears_then_sets() {
        let regs = MemoryRegisters::with_values([(0x20, 0b1111_0000)]);
        regs.modify(0x20, 0b0011_0000, 0b0000_0001);
        assert_eq!(regs.peek(0x20), 0b1100_0001);
        assert_eq!(regs.writes_to(0x20), vec![0b1100_0001]);
    }

    #[test]
    fn field_rejects_bad_geometry() {
        assert!(Field::new(0, 0).is_none());
        assert!(Field::new(30, 3).is_none());
        assert!(Field::new(0, 32).is_some());
    }

    #[test]
    fn field_get_prep_insert() {
        let f = Field::new(4, 3).unwrap();
        assert_eq!(f.mask(), 0b0111_0000);
        assert_eq!(f.max_value(), 7);
        assert_eq!(f.get(0b1101_0110), 0b101);
        assert_eq!(f.prep(0b1111), 0b0111_0000, "prep truncates to width");
        assert_eq!(f.insert(0xFFFF_FFFF, 0), 0xFFFF_FF8F);
    }

    #[test]
    fn full_width_field_does_not_overflow() {
        let f = Field::new(0, 32).unwrap();
        assert_eq!(f.mask(), u32::MAX);
        assert_eq!(f.get(0xDEAD_BEEF), 0xDEAD_BEEF);
    }

    #[test]
    fn bitref_set_and_clear() {
        let regs = MemoryRegisters::new();
        let b = BitRef::new(0x30, 5).unwrap();
        assert!(!b.is_set(&regs));
        b.set(&regs);
        assert!(b.is_set(&regs));
        assert_eq!(regs.peek(0x30), 1 << 5);
        b.clear(&regs);
        assert_eq!(regs.peek(0x30), 0);
        assert!(BitRef::new(0x30, 32).is_none());
    }
}
