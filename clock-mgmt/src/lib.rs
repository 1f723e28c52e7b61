/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! clock-mgmt – clock tree model, rate propagation and rate negotiation
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── hal/        – register access, bit fields, polling and delays
//! ├── error       – ClockError, the crate-wide error type
//! ├── tree/       – clock arena, builder, notification and ownership
//! ├── drivers/    – per-kind clock behaviour (source, gate, div, mux, pll, …)
//! ├── mgmt/       – per-device output clocks and clock states
//! └── config/     – YAML board description loader
//! ```

pub mod config;
pub mod drivers;
pub mod error;
pub mod hal;
pub mod mgmt;
pub mod tree;

pub use error::{ClockError, Result};
pub use mgmt::{ClockManagement, ClockState};
pub use tree::{ClockId, ClockTree, OwnerId};
