//! The async runtime: mirrors [`crate::core`] node-for-node but drives
//! lifecycles through `async fn`s (via `async-trait`), and adds the two
//! variants that only make sense once execution can actually overlap —
//! [`AsyncParallelBatchNode`] and [`AsyncParallelBatchFlow`].
//!
//! A plain [`crate::core::NodeBehavior`] can be dropped into an async graph
//! unchanged: the blanket `impl<T: NodeBehavior> AsyncNodeBehavior for T` in
//! `node.rs` runs its sync phases inline inside the async trait methods, no
//! real suspension involved. This is how "mixed graphs" are supported
//! without a combined sync/async trait-object type.

mod batch;
mod flow;
mod node;
mod parallel_batch;

pub use batch::{AsyncBatchNode, AsyncBatchNodeBehavior};
pub use flow::{
    AsyncBatchFlow, AsyncBatchFlowBehavior, AsyncFlow, AsyncFlowBehavior, AsyncParallelBatchFlow,
    DefaultAsyncFlowBehavior,
};
pub use node::{AsyncNode, AsyncNodeBehavior, AsyncNodeObject};
pub use parallel_batch::AsyncParallelBatchNode;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::params::Params;

/// Same role as [`crate::core::Topology`], specialized to
/// `Arc<dyn AsyncNodeObject>` successors.
#[derive(Clone)]
pub(crate) struct AsyncTopology {
    successors: Arc<RwLock<HashMap<String, Arc<dyn AsyncNodeObject>>>>,
    pub(crate) params: Params,
}

impl Default for AsyncTopology {
    fn default() -> Self {
        Self {
            successors: Arc::new(RwLock::new(HashMap::new())),
            params: Params::new(),
        }
    }
}

impl AsyncTopology {
    pub(crate) fn connect_on(&self, action: &str, successor: Arc<dyn AsyncNodeObject>) {
        let mut table = self.successors.write();
        if table.insert(action.to_string(), successor).is_some() {
            tracing::warn!(action, "overwriting existing edge for action");
        }
    }

    pub(crate) fn successor_for(&self, action: &str) -> Option<Arc<dyn AsyncNodeObject>> {
        self.successors.read().get(action).cloned()
    }

    pub(crate) fn successor_keys(&self) -> Vec<String> {
        self.successors.read().keys().cloned().collect()
    }

    pub(crate) fn has_successors(&self) -> bool {
        !self.successors.read().is_empty()
    }
}
