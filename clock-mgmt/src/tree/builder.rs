/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Incremental construction of a [`ClockTree`].
//!
//! Nodes are added parents-first. A parent reference can only name a node
//! that already exists, so the finished graph is acyclic by construction.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::drivers::ClockDriver;
use crate::error::{ClockError, Result};
use crate::hal::{Delay, RegisterBlock};

use super::{ClockId, ClockNode, ClockTree};

#[derive(Debug, Default)]
pub struct TopologyBuilder {
    nodes: Vec<(String, Box<dyn ClockDriver>)>,
    index: HashMap<String, ClockId>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Id of an already-added node.
    pub fn id(&self, name: &str) -> Option<ClockId> {
        self.index.get(name).copied()
    }

    pub fn add(&mut self, name: impl Into<String>, driver: impl ClockDriver + 'static) -> Result<ClockId> {
        self.add_boxed(name, Box::new(driver))
    }

    /// # Errors
    /// `Topology` for an empty or duplicate name, or a parent id that was not
    /// returned by an earlier `add`.
    pub fn add_boxed(&mut self, name: impl Into<String>, driver: Box<dyn ClockDriver>) -> Result<ClockId> {
        let name = name.into();
        if name.is_empty() {
            return Err(ClockError::Topology("clock name must not be empty".into()));
        }
        if self.index.contains_key(&name) {
            return Err(ClockError::Topology(format!("duplicate clock '{name}'")));
        }
        if let Some(bad) = driver.parents().iter().find(|p| p.0 >= self.nodes.len()) {
            return Err(ClockError::Topology(format!(
                "clock '{name}' references {bad}, which is not defined before it"
            )));
        }

        let id = ClockId(self.nodes.len());
        self.index.insert(name.clone(), id);
        self.nodes.push((name, driver));
        Ok(id)
    }

    /// Freeze the shape and derive each node's child list.
    ///
    /// Children appear in definition order; a node that lists the same parent
    /// more than once (a mux with duplicated inputs) is that parent's child
    /// only once.
    pub fn build(self, regs: Arc<dyn RegisterBlock>, delay: Arc<dyn Delay>) -> ClockTree {
        let mut children: Vec<Vec<ClockId>> = vec![Vec::new(); self.nodes.len()];
        for (i, (_, driver)) in self.nodes.iter().enumerate() {
            for parent in driver.parents() {
                let list = &mut children[parent.0];
                if list.last() != Some(&ClockId(i)) {
                    list.push(ClockId(i));
                }
            }
        }

        let nodes: Vec<ClockNode> = self
            .nodes
            .into_iter()
            .zip(children)
            .map(|((name, driver), children)| ClockNode {
                name,
                driver,
                children,
                owner: Mutex::new(None),
                recorded: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
            })
            .collect();

        info!(clocks = nodes.len(), "clock tree built");
        ClockTree::from_parts(nodes, self.index, regs, delay)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
