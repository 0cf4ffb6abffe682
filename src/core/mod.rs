//! The synchronous runtime: [`NodeObject`] (the edge-table + lifecycle
//! contract every node satisfies), [`Node`]/[`BatchNode`] (concrete wrappers
//! adding retry and batching over user-supplied behavior), and
//! [`Flow`]/[`BatchFlow`] (the orchestrator).
//!
//! Mirrors the teacher's split between `NodeBackend` (what a user
//! implements) and a generic `Node<B, S>` wrapper (what the runtime
//! provides), but replaces the teacher's type-parameter-per-graph design
//! with trait objects (`Arc<dyn NodeObject>`): the spec requires a single
//! `Flow` to walk a graph of heterogeneous node types, which a shared
//! generic parameter can't express.

mod batch;
mod flow;
mod node;

pub use batch::{BatchNode, BatchNodeBehavior};
pub use flow::{BatchFlow, BatchFlowBehavior, DefaultFlowBehavior, Flow, FlowBehavior};
pub use node::{Node, NodeBehavior, NodeObject};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::params::Params;

/// Topology + per-visit configuration shared by every concrete node/flow
/// wrapper. The successor table lives behind an `Arc<RwLock<_>>` so edges
/// can be added after a node has already been shared via `Arc<dyn
/// NodeObject>` — required to wire cycles, where two nodes each need to
/// reference the other. `params` is a plain field: cloning the owning
/// struct (via `dyn_clone`, done once per orchestrator visit) gives every
/// visit its own independent copy, while the `Arc`-shared successor table
/// is intentionally *not* duplicated — this is the "shallow copy" spec §3
/// calls for: topology shared, visit state forked.
#[derive(Clone)]
pub(crate) struct Topology {
    successors: Arc<RwLock<HashMap<String, Arc<dyn NodeObject>>>>,
    pub(crate) params: Params,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            successors: Arc::new(RwLock::new(HashMap::new())),
            params: Params::new(),
        }
    }
}

impl Topology {
    pub(crate) fn connect_on(&self, action: &str, successor: Arc<dyn NodeObject>) {
        let mut table = self.successors.write();
        if table.insert(action.to_string(), successor).is_some() {
            tracing::warn!(action, "overwriting existing edge for action");
        }
    }

    pub(crate) fn successor_for(&self, action: &str) -> Option<Arc<dyn NodeObject>> {
        self.successors.read().get(action).cloned()
    }

    pub(crate) fn successor_keys(&self) -> Vec<String> {
        self.successors.read().keys().cloned().collect()
    }

    pub(crate) fn has_successors(&self) -> bool {
        !self.successors.read().is_empty()
    }
}
