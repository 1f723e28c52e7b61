/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-device clock management.
//!
//! A peripheral driver does not address clock nodes directly. It holds a
//! [`ClockManagement`] describing its output clocks (by index) and the clock
//! states it can switch between, and acts under a single [`OwnerId`].
//!
//! | State index | Meaning |
//! |---|---|
//! | 0 | `default`, applied at init |
//! | 1 | `sleep` |
//! | ≥ 2 | device-private |

use tracing::{debug, info};

use crate::drivers::ClockConfig;
use crate::error::{ClockError, Result};
use crate::tree::{ClockId, ClockTree, OwnerId};

pub const STATE_DEFAULT: usize = 0;
pub const STATE_SLEEP: usize = 1;

/// One named set of configurations applied together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockState {
    pub name: String,
    pub entries: Vec<(ClockId, ClockConfig)>,
}

#[derive(Debug, Clone)]
pub struct ClockManagement {
    device: String,
    owner: OwnerId,
    outputs: Vec<ClockId>,
    states: Vec<ClockState>,
}

impl ClockManagement {
    pub fn new(
        device: impl Into<String>,
        owner: OwnerId,
        outputs: Vec<ClockId>,
        states: Vec<ClockState>,
    ) -> Self {
        Self {
            device: device.into(),
            owner,
            outputs,
            states,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn outputs(&self) -> &[ClockId] {
        &self.outputs
    }

    pub fn states(&self) -> &[ClockState] {
        &self.states
    }

    /// Index of the state called `name`.
    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s.name == name)
    }

    fn output(&self, index: usize) -> Result<ClockId> {
        self.outputs.get(index).copied().ok_or_else(|| {
            ClockError::invalid(
                &self.device,
                format!("output {index} out of range ({} defined)", self.outputs.len()),
            )
        })
    }

    pub fn get_rate(&self, tree: &ClockTree, output: usize) -> Result<u32> {
        tree.get_rate(self.output(output)?)
    }

    /// Apply every entry of state `index` in order.
    ///
    /// # Errors
    /// `StateNotFound` for an undefined index. Otherwise the first failing
    /// entry's error; entries after it are not applied.
    pub fn apply_state(&self, tree: &ClockTree, index: usize) -> Result<()> {
        let state = self.states.get(index).ok_or_else(|| ClockError::StateNotFound {
            device: self.device.clone(),
            index,
            count: self.states.len(),
        })?;

        info!(device = %self.device, state = %state.name, entries = state.entries.len(), "applying clock state");
        for (clock, config) in &state.entries {
            tree.configure(*clock, config)?;
        }
        Ok(())
    }

    pub fn round_rate(&self, tree: &ClockTree, output: usize, rate: u32) -> Result<u32> {
        tree.round_rate(self.output(output)?, rate, self.owner)
    }

    pub fn set_rate(&self, tree: &ClockTree, output: usize, rate: u32) -> Result<u32> {
        tree.set_rate(self.output(output)?, rate, self.owner)
    }

    /// Give up ownership of an output and the upstream clocks taken through it.
    pub fn release(&self, tree: &ClockTree, output: usize) -> Result<()> {
        tree.unlock(self.output(output)?, self.owner)
    }

    /// Call `callback(output_index, rate)` whenever any output's rate changes.
    pub fn set_callback<F>(&self, tree: &ClockTree, callback: F) -> Result<()>
    where
        F: Fn(usize, u32) + Send + Sync + Clone + 'static,
    {
        for (index, &clock) in self.outputs.iter().enumerate() {
            let cb = callback.clone();
            tree.subscribe(clock, move |change| cb(index, change.rate))?;
        }
        debug!(device = %self.device, outputs = self.outputs.len(), "rate callback installed");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::div::{Divider, DividerConfig};
    use crate::drivers::fixtures::Fixture;
    use crate::drivers::gate::Gate;
    use crate::drivers::mux::{Mux, MuxConfig};
    use crate::drivers::output::Output;
    use crate::drivers::source::FixedSource;
    use parking_lot::Mutex;
    use std::sync::Arc;

    const SEL: u32 = 0x4000_0280;
    const DIV: u32 = 0x4000_0380;
    const GATE: u32 = 0x4000_0204;

    /// fro_12m ─┐
    ///          ├─ sel ── div ── gate ─┬─ uart
    /// fro_96m ─┘                      └─ spi
    fn board() -> (ClockTree, ClockManagement) {
        let mut fx = Fixture::new();
        let a = fx.add("fro_12m", FixedSource::new(12_000_000));
        let b = fx.add("fro_96m", FixedSource::new(96_000_000));
        let sel = fx.add("sel", Mux::new(MuxConfig::new(vec![a, b], SEL, 0, 1)).unwrap());
        let div = fx.add("div", Divider::new(DividerConfig::plain(sel, DIV, 0, 8)).unwrap());
        let gate = fx.add("gate", Gate::new(div, GATE, 0).unwrap());
        let uart = fx.add("uart", Output::new(gate));
        let spi = fx.add("spi", Output::new(gate));
        let tree = fx.build();

        let states = vec![
            ClockState {
                name: "default".into(),
                entries: vec![
                    (sel, ClockConfig::MuxSelect(1)),
                    (div, ClockConfig::Divider(2)),
                    (gate, ClockConfig::Gate(true)),
                ],
            },
            ClockState {
                name: "sleep".into(),
                entries: vec![(gate, ClockConfig::Gate(false))],
            },
            ClockState {
                name: "broken".into(),
                entries: vec![
                    (div, ClockConfig::Divider(4)),
                    (sel, ClockConfig::MuxSelect(7)),
                    (div, ClockConfig::Divider(8)),
                ],
            },
        ];
        let mgmt = ClockManagement::new("flexcomm0", OwnerId::Consumer(1), vec![uart, spi], states);
        (tree, mgmt)
    }

    #[test]
    fn default_state_then_sleep() {
        let (tree, mgmt) = board();
        mgmt.apply_state(&tree, STATE_DEFAULT).unwrap();
        assert_eq!(mgmt.get_rate(&tree, 0).unwrap(), 48_000_000);
        assert_eq!(mgmt.get_rate(&tree, 1).unwrap(), 48_000_000);
        mgmt.apply_state(&tree, STATE_SLEEP).unwrap();
        assert_eq!(mgmt.get_rate(&tree, 0).unwrap(), 0);
    }

    #[test]
    fn unknown_state_is_reported() {
        let (tree, mgmt) = board();
        let err = mgmt.apply_state(&tree, 9).unwrap_err();
        assert_eq!(
            err,
            ClockError::StateNotFound {
                device: "flexcomm0".into(),
                index: 9,
                count: 3
            }
        );
        assert_eq!(mgmt.state_index("sleep"), Some(STATE_SLEEP));
    }

    #[test]
    fn apply_state_stops_at_first_failure() {
        let (tree, mgmt) = board();
        let div = tree.find("div").unwrap();
        let err = mgmt.apply_state(&tree, 2).unwrap_err();
        assert!(matches!(err, ClockError::InvalidArgument { .. }));
        // First entry landed, third never ran.
        assert_eq!(tree.get_rate(div).unwrap(), 3_000_000);
    }

    #[test]
    fn bad_output_index_is_invalid() {
        let (tree, mgmt) = board();
        assert!(matches!(
            mgmt.get_rate(&tree, 2),
            Err(ClockError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn callback_receives_output_index_and_rate() {
        let (tree, mgmt) = board();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            mgmt.set_callback(&tree, move |idx, rate| seen.lock().push((idx, rate)))
                .unwrap();
        }
        mgmt.apply_state(&tree, STATE_DEFAULT).unwrap();
        let seen = seen.lock().clone();
        assert!(seen.contains(&(0, 48_000_000)));
        assert!(seen.contains(&(1, 48_000_000)));
    }

    #[test]
    fn set_rate_and_release_use_device_owner() {
        let (tree, mgmt) = board();
        mgmt.apply_state(&tree, STATE_DEFAULT).unwrap();
        assert_eq!(mgmt.round_rate(&tree, 0, 12_000_000).unwrap(), 12_000_000);
        assert_eq!(mgmt.set_rate(&tree, 0, 12_000_000).unwrap(), 12_000_000);
        let div = tree.find("div").unwrap();
        assert_eq!(tree.owner(div), Some(OwnerId::Consumer(1)));

        // Another device cannot move the shared divider now.
        let spi = tree.find("spi").unwrap();
        assert_eq!(tree.set_rate(spi, 96_000_000, OwnerId::Consumer(2)).unwrap(), 12_000_000);

        mgmt.release(&tree, 0).unwrap();
        assert_eq!(tree.owner(div), None);
        assert_eq!(tree.set_rate(spi, 96_000_000, OwnerId::Consumer(2)).unwrap(), 96_000_000);
    }
}
