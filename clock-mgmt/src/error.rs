/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error type for the clock tree.
//!
//! Every variant names the clock it happened on so a single `tracing` event
//! or log line is enough to locate the fault without a backtrace.
//!
//! Informational propagation results (`NotUsingThisParent`,
//! `NoDownstreamConsumers`) are *not* errors and live in
//! [`NotifyStatus`](crate::tree::NotifyStatus) instead.
//!
//! | Variant | Typical cause |
//! |---|---|
//! | `Io` | divisor field evaluates to zero, selector out of range, PLL never locked |
//! | `InvalidArgument` | mux index ≥ parent count, divisor not representable, wrong config variant |
//! | `Unsupported` | capability absent from the node's table |
//! | `PermissionDenied` | `unlock` by a consumer that does not hold the token |
//! | `Propagation` | one or more subscribers failed during fan-out |

use thiserror::Error;

use crate::tree::OwnerId;

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, ClockError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    /// A register holds a value the hardware can never legitimately produce.
    #[error("clock '{clock}': register {addr:#010x} reads {value:#x}: {reason}")]
    Io {
        clock: String,
        addr: u32,
        value: u32,
        reason: &'static str,
    },

    /// The caller asked for something outside the node's declared range.
    #[error("clock '{clock}': invalid argument: {reason}")]
    InvalidArgument { clock: String, reason: String },

    /// The node's capability table has no entry for this operation.
    #[error("clock '{clock}' does not implement {operation}")]
    Unsupported {
        clock: String,
        operation: &'static str,
    },

    /// The ownership token is held by someone else.
    #[error("clock '{clock}' is held by {holder}; request from {requester} denied")]
    PermissionDenied {
        clock: String,
        holder: OwnerId,
        requester: OwnerId,
    },

    /// A [`ClockId`](crate::tree::ClockId) that does not belong to this tree.
    #[error("unknown clock id {0}")]
    UnknownClock(usize),

    /// The topology handed to the builder is malformed.
    #[error("invalid topology: {0}")]
    Topology(String),

    /// `apply_state` was asked for a state index the device does not define.
    #[error("device '{device}' has no clock state {index} ({count} defined)")]
    StateNotFound {
        device: String,
        index: usize,
        count: usize,
    },

    /// Fan-out completed but at least one subscriber failed.
    ///
    /// Only the first failure is kept; the rest are logged where they occur.
    #[error("rate change on '{clock}' failed in {failures} subscriber(s); first: {first}")]
    Propagation {
        clock: String,
        failures: usize,
        first: Box<ClockError>,
    },
}

impl ClockError {
    pub(crate) fn invalid(clock: &str, reason: impl Into<String>) -> Self {
        ClockError::InvalidArgument {
            clock: clock.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(clock: &str, operation: &'static str) -> Self {
        ClockError::Unsupported {
            clock: clock.to_string(),
            operation,
        }
    }

    pub(crate) fn io(clock: &str, addr: u32, value: u32, reason: &'static str) -> Self {
        ClockError::Io {
            clock: clock.to_string(),
            addr,
            value,
            reason,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
