/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Board description loading.
//!
//! A board file lists the clock graph in dependency order (every parent
//! before its children), the initial register contents, and the devices that
//! consume clocks together with their named clock states.
//!
//! ```yaml
//! registers:
//!   - { addr: 0x40000280, value: 0x1 }
//! clocks:
//!   - { name: fro_12m,  kind: fixed, frequency: 12000000 }
//!   - { name: fro_hf,   kind: source, frequency: 96000000,
//!       enable: { reg: 0x40000200, bit: 0 } }
//!   - { name: main_sel, kind: mux, parents: [fro_12m, fro_hf],
//!       reg: 0x40000280, width: 3 }
//!   - { name: ahb_div,  kind: divider, parent: main_sel,
//!       reg: 0x40000380, width: 8 }
//!   - { name: uart0,    kind: output, parent: ahb_div }
//! devices:
//!   - name: flexcomm0
//!     owner: 1
//!     outputs: [uart0]
//!     states:
//!       - name: default
//!         clocks:
//!           - { clock: ahb_div, divider: 2 }
//! ```
//!
//! | `kind` | Fields |
//! |---|---|
//! | `fixed` | `frequency` |
//! | `source` | `frequency`, `enable`?, `power_down`? |
//! | `gate` | `parent`, `reg`, `bit` |
//! | `divider` | `parent`, `reg`, `offset`?, `width`, `add_factor`? |
//! | `pdec` | `parent`, `reg` |
//! | `frg` | `parent`, `reg` |
//! | `mux` | `parents`, `reg`, `offset`?, `width` |
//! | `pll` | `parent`, `variant`, `base`, `power_reg`, `power_down_mask`, `lock_poll_limit`?, `setpoints`? |
//! | `output` | `parent` |

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::drivers::div::{Divider, DividerConfig};
use crate::drivers::frg::{Frg, FrgConfig};
use crate::drivers::gate::{Gate, GateConfig};
use crate::drivers::mux::{Mux, MuxConfig};
use crate::drivers::output::Output;
use crate::drivers::pll::{Pll, PllConfig, PllVariant};
use crate::drivers::source::{FixedSource, SysconSource, SysconSourceConfig};
use crate::drivers::{ClockConfig, ClockDriver, PllSetting};
use crate::hal::{BitRef, Delay, MemoryRegisters};
use crate::mgmt::{ClockManagement, ClockState};
use crate::tree::{ClockId, ClockTree, OwnerId, TopologyBuilder};

// ── Private YAML deserialization types ────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BoardFile {
    #[serde(default)]
    registers: Vec<RegisterEntry>,
    clocks: Vec<ClockEntry>,
    #[serde(default)]
    devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegisterEntry {
    addr: u32,
    value: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
struct BitEntry {
    reg: u32,
    bit: u8,
}

/// One `clocks:` entry. Keys a kind does not define are rejected.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
enum ClockEntry {
    Fixed {
        name: String,
        frequency: u32,
    },
    Source {
        name: String,
        frequency: u32,
        #[serde(default)]
        enable: Option<BitEntry>,
        #[serde(default)]
        power_down: Option<BitEntry>,
    },
    Gate {
        name: String,
        parent: String,
        reg: u32,
        bit: u8,
    },
    Divider {
        name: String,
        parent: String,
        reg: u32,
        #[serde(default)]
        offset: u8,
        width: u8,
        /// Present for RTC-style dividers (`N = field + add_factor`).
        #[serde(default)]
        add_factor: Option<u32>,
    },
    Pdec {
        name: String,
        parent: String,
        reg: u32,
    },
    Frg {
        name: String,
        parent: String,
        reg: u32,
    },
    Mux {
        name: String,
        parents: Vec<String>,
        reg: u32,
        #[serde(default)]
        offset: u8,
        width: u8,
    },
    Pll {
        name: String,
        parent: String,
        variant: VariantEntry,
        base: u32,
        power_reg: u32,
        power_down_mask: u32,
        #[serde(default)]
        lock_poll_limit: Option<u32>,
        #[serde(default)]
        setpoints: Vec<PllSetting>,
    },
    Output {
        name: String,
        parent: String,
    },
}

impl ClockEntry {
    fn name(&self) -> &str {
        match self {
            ClockEntry::Fixed { name, .. }
            | ClockEntry::Source { name, .. }
            | ClockEntry::Gate { name, .. }
            | ClockEntry::Divider { name, .. }
            | ClockEntry::Pdec { name, .. }
            | ClockEntry::Frg { name, .. }
            | ClockEntry::Mux { name, .. }
            | ClockEntry::Pll { name, .. }
            | ClockEntry::Output { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum VariantEntry {
    Pll0,
    Pll1,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeviceEntry {
    name: String,
    owner: u32,
    outputs: Vec<String>,
    #[serde(default)]
    states: Vec<StateEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StateEntry {
    name: String,
    #[serde(default)]
    clocks: Vec<StateClockEntry>,
}

/// One `(clock, setting)` pair; exactly one setting key must be present.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StateClockEntry {
    clock: String,
    #[serde(default)]
    gate: Option<bool>,
    #[serde(default)]
    divider: Option<u32>,
    #[serde(default)]
    mult: Option<u32>,
    #[serde(default)]
    select: Option<usize>,
    #[serde(default)]
    pll: Option<PllSetting>,
    #[serde(default)]
    rate: Option<u32>,
}

impl StateClockEntry {
    fn into_config(self) -> Result<(String, ClockConfig)> {
        let mut found: Vec<ClockConfig> = Vec::new();
        found.extend(self.gate.map(ClockConfig::Gate));
        found.extend(self.divider.map(ClockConfig::Divider));
        found.extend(self.mult.map(ClockConfig::FrgMult));
        found.extend(self.select.map(ClockConfig::MuxSelect));
        found.extend(self.pll.map(ClockConfig::Pll));
        found.extend(self.rate.map(ClockConfig::Rate));

        match found.len() {
            1 => Ok((self.clock, found.remove(0))),
            0 => bail!("state entry for '{}' has no setting", self.clock),
            n => bail!("state entry for '{}' has {n} settings, expected one", self.clock),
        }
    }
}

// ── Public data structures ────────────────────────────────────────────────────

/// A fully built board: the clock tree, its register mirror and its devices.
#[derive(Debug)]
pub struct Board {
    pub tree: ClockTree,
    pub regs: Arc<MemoryRegisters>,
    pub devices: Vec<ClockManagement>,
}

impl Board {
    /// Parse and build the board described by `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the YAML is malformed, or
    /// the described topology is invalid.
    pub fn load(path: &Path, delay: Arc<dyn Delay>) -> Result<Self> {
        info!("Loading board description from: {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open board file: {}", path.display()))?;
        Self::from_yaml(&content, delay)
            .with_context(|| format!("Invalid board file: {}", path.display()))
    }

    pub fn from_yaml(content: &str, delay: Arc<dyn Delay>) -> Result<Self> {
        let file: BoardFile = serde_yaml::from_str(content).context("Failed to parse board YAML")?;

        let regs = Arc::new(MemoryRegisters::with_values(
            file.registers.iter().map(|r| (r.addr, r.value)),
        ));

        let mut builder = TopologyBuilder::new();
        for entry in &file.clocks {
            let name = entry.name();
            let driver =
                build_driver(&builder, entry).with_context(|| format!("clock '{name}'"))?;
            debug!(clock = %name, kind = driver.kind(), "clock defined");
            builder
                .add_boxed(name, driver)
                .with_context(|| format!("clock '{name}'"))?;
        }
        let tree = builder.build(regs.clone(), delay);

        let devices = file
            .devices
            .into_iter()
            .map(|d| build_device(&tree, d))
            .collect::<Result<Vec<_>>>()?;

        let unreadable = tree.refresh_recorded_rates();
        if unreadable > 0 {
            warn!(unreadable, "some clocks have no readable rate at start-up");
        }

        info!(
            "Board loaded: {} clock(s), {} device(s), {} preset register(s)",
            tree.len(),
            devices.len(),
            file.registers.len(),
        );
        Ok(Self {
            tree,
            regs,
            devices,
        })
    }

    pub fn device(&self, name: &str) -> Option<&ClockManagement> {
        self.devices.iter().find(|d| d.device() == name)
    }
}

// ── Builders ──────────────────────────────────────────────────────────────────

fn resolve(builder: &TopologyBuilder, name: &str) -> Result<ClockId> {
    builder
        .id(name)
        .ok_or_else(|| anyhow!("unknown parent '{name}' (parents must be listed first)"))
}

fn bit(entry: BitEntry) -> Result<BitRef> {
    BitRef::new(entry.reg, entry.bit)
        .ok_or_else(|| anyhow!("bit {} of {:#010x} is out of range", entry.bit, entry.reg))
}

fn build_driver(builder: &TopologyBuilder, entry: &ClockEntry) -> Result<Box<dyn ClockDriver>> {
    let driver: Box<dyn ClockDriver> = match entry {
        ClockEntry::Fixed { frequency, .. } => Box::new(FixedSource::new(*frequency)),
        ClockEntry::Source {
            frequency,
            enable,
            power_down,
            ..
        } => Box::new(SysconSource::new(SysconSourceConfig {
            rate: *frequency,
            enable: enable.map(bit).transpose()?,
            power_down: power_down.map(bit).transpose()?,
        })),
        ClockEntry::Gate {
            parent,
            reg,
            bit: b,
            ..
        } => Box::new(Gate::with_config(GateConfig {
            parent: resolve(builder, parent)?,
            enable: bit(BitEntry { reg: *reg, bit: *b })?,
        })),
        ClockEntry::Divider {
            parent,
            reg,
            offset,
            width,
            add_factor,
            ..
        } => {
            let parent = resolve(builder, parent)?;
            let cfg = match add_factor {
                Some(f) => DividerConfig::rtc(parent, *reg, *offset, *width, *f),
                None => DividerConfig::plain(parent, *reg, *offset, *width),
            };
            Box::new(Divider::new(cfg)?)
        }
        ClockEntry::Pdec { parent, reg, .. } => {
            Box::new(Divider::new(DividerConfig::pdec(resolve(builder, parent)?, *reg))?)
        }
        ClockEntry::Frg { parent, reg, .. } => Box::new(Frg::new(FrgConfig {
            parent: resolve(builder, parent)?,
            reg: *reg,
        })),
        ClockEntry::Mux {
            parents,
            reg,
            offset,
            width,
            ..
        } => {
            let parents = parents
                .iter()
                .map(|p| resolve(builder, p))
                .collect::<Result<Vec<_>>>()?;
            Box::new(Mux::new(MuxConfig::new(parents, *reg, *offset, *width))?)
        }
        ClockEntry::Pll {
            parent,
            variant,
            base,
            power_reg,
            power_down_mask,
            lock_poll_limit,
            setpoints,
            ..
        } => Box::new(Pll::new(PllConfig {
            parent: resolve(builder, parent)?,
            variant: match variant {
                VariantEntry::Pll0 => PllVariant::Pll0,
                VariantEntry::Pll1 => PllVariant::Pll1,
            },
            base: *base,
            power_reg: *power_reg,
            power_down_mask: *power_down_mask,
            lock_poll_limit: *lock_poll_limit,
            setpoints: setpoints.clone(),
        })?),
        ClockEntry::Output { parent, .. } => Box::new(Output::new(resolve(builder, parent)?)),
    };
    Ok(driver)
}

fn build_device(tree: &ClockTree, entry: DeviceEntry) -> Result<ClockManagement> {
    let lookup = |name: &str| {
        tree.find(name)
            .ok_or_else(|| anyhow!("device '{}' references unknown clock '{name}'", entry.name))
    };

    let outputs = entry
        .outputs
        .iter()
        .map(|o| lookup(o))
        .collect::<Result<Vec<_>>>()?;

    let mut states = Vec::with_capacity(entry.states.len());
    for state in entry.states {
        let mut entries = Vec::with_capacity(state.clocks.len());
        for clock in state.clocks {
            let (name, config) = clock
                .into_config()
                .with_context(|| format!("device '{}' state '{}'", entry.name, state.name))?;
            entries.push((lookup(&name)?, config));
        }
        states.push(ClockState {
            name: state.name,
            entries,
        });
    }

    debug!(
        device = %entry.name,
        owner = entry.owner,
        outputs = outputs.len(),
        states = states.len(),
        "device defined"
    );
    Ok(ClockManagement::new(
        entry.name.clone(),
        OwnerId::Consumer(entry.owner),
        outputs,
        states,
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
