/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Downstream rate-change propagation.
//!
//! When a node's output changes it calls [`ClockTree::notify_children`] with
//! the new rate. Every child that accepts notifications is told in fan-out
//! order; each decides whether the change is relevant to it and, if so,
//! recomputes its own output and recurses.
//!
//! Subscribers registered with [`ClockTree::subscribe`] are fired whenever
//! the recorded rate of the node actually changes.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::drivers::Capabilities;
use crate::error::{ClockError, Result};

use super::{ClockCtx, ClockId, ClockTree};

/// What a child answered to a rate-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyStatus {
    /// At least one consumer further down is using the new rate.
    InUse,
    /// The child exists but is currently fed by a different parent.
    NotUsingThisParent,
    /// The child (or everything below it) is idle or gated.
    NoDownstreamConsumers,
}

/// Delivered to subscribers after a node's rate changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateChange {
    pub clock: ClockId,
    /// `None` the first time the rate is recorded.
    pub previous: Option<u32>,
    pub rate: u32,
}

pub type RateCallback = Arc<dyn Fn(&RateChange) + Send + Sync>;

/// Pass a rate straight through to the node's own children.
///
/// Used by nodes that do not transform their input (enabled gates and
/// consumer outputs).
pub fn forward(cx: &ClockCtx<'_>, rate: u32) -> Result<NotifyStatus> {
    cx.propagate(rate)
}

impl ClockTree {
    /// Register a callback fired when `id`'s recorded rate changes.
    pub fn subscribe(
        &self,
        id: ClockId,
        callback: impl Fn(&RateChange) + Send + Sync + 'static,
    ) -> Result<()> {
        let node = self.node(id)?;
        node.subscribers.lock().push(Arc::new(callback));
        Ok(())
    }

    /// Tell every child of `id` that its output is now `rate` Hz.
    ///
    /// The fan-out never stops early. Children without notify capability are
    /// skipped and do not count as consumers.
    ///
    /// # Returns
    /// `InUse` if any child reported use, `NoDownstreamConsumers` otherwise.
    ///
    /// # Errors
    /// [`ClockError::Propagation`] once the whole fan-out is done, if any
    /// child failed.
    pub fn notify_children(&self, id: ClockId, rate: u32) -> Result<NotifyStatus> {
        let node = self.node(id)?;

        let previous = node.recorded.lock().replace(rate);
        if previous != Some(rate) {
            let subscribers: Vec<RateCallback> = node.subscribers.lock().clone();
            if !subscribers.is_empty() {
                let change = RateChange {
                    clock: id,
                    previous,
                    rate,
                };
                trace!(clock = %node.name, rate, count = subscribers.len(), "firing subscribers");
                for callback in &subscribers {
                    callback(&change);
                }
            }
        }

        let mut in_use = false;
        let mut failures = 0usize;
        let mut first: Option<ClockError> = None;

        for &child in &node.children {
            let child_node = self.node(child)?;
            if !child_node.driver.capabilities().contains(Capabilities::NOTIFY) {
                continue;
            }
            let cx = ClockCtx::new(self, child, &child_node.name);
            match child_node.driver.notify(&cx, id, rate) {
                Ok(NotifyStatus::InUse) => in_use = true,
                Ok(status) => {
                    trace!(parent = %node.name, child = %child_node.name, ?status, "child not using rate");
                }
                Err(e) => {
                    warn!(parent = %node.name, child = %child_node.name, rate, error = %e, "rate notification failed");
                    failures += 1;
                    first.get_or_insert(e);
                }
            }
        }

        if let Some(first) = first {
            return Err(ClockError::Propagation {
                clock: node.name.clone(),
                failures,
                first: Box::new(first),
            });
        }

        Ok(if in_use {
            NotifyStatus::InUse
        } else {
            NotifyStatus::NoDownstreamConsumers
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
