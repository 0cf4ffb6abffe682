use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::node::{run_with_retry, NodeObject};
use super::Topology;
use crate::action::Action;
use crate::error::NodeError;
use crate::params::Params;
use crate::shared::Shared;

/// What a user implements for a batch node: `prep` returns an ordered
/// sequence, `exec` runs once per element (spec §4.3).
pub trait BatchNodeBehavior: Send + Sync + Clone + 'static {
    fn prep(&self, _shared: &Shared, _params: &Params) -> Result<Vec<Value>, NodeError> {
        Ok(Vec::new())
    }

    /// Process one element. `attempt` is the 0-based retry attempt for
    /// *this element* — retries are scoped per element, not across the
    /// batch (spec §4.3).
    fn exec(&self, _item: Value, _attempt: usize) -> Result<Value, NodeError> {
        Ok(Value::Null)
    }

    fn post(
        &self,
        _shared: &Shared,
        _prep_result: Vec<Value>,
        _exec_result: Vec<Value>,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        Ok(Action::default())
    }

    fn exec_fallback(&self, _item: Value, error: NodeError) -> Result<Value, NodeError> {
        Err(error)
    }

    fn name(&self) -> &str {
        "batch_node"
    }
}

/// Adapts a [`BatchNodeBehavior`] into a [`NodeObject`]: `exec` runs once
/// per element of `prep`'s sequence, in order, each with its own
/// retry/fallback; the aggregated, order-preserving `Vec<Value>` is handed
/// to `post`. An empty `prep` result still invokes `post` (spec §4.3).
#[derive(Clone)]
pub struct BatchNode<B: BatchNodeBehavior> {
    behavior: B,
    topology: Topology,
    max_retries: usize,
    wait: Duration,
}

impl<B: BatchNodeBehavior> BatchNode<B> {
    pub fn new(behavior: B) -> Self {
        Self {
            behavior,
            topology: Topology::default(),
            max_retries: 1,
            wait: Duration::ZERO,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn connect_default(self, successor: Arc<dyn NodeObject>) -> Self {
        self.topology.connect_on("default", successor);
        self
    }

    pub fn connect_on(self, action: &str, successor: Arc<dyn NodeObject>) -> Self {
        self.topology.connect_on(action, successor);
        self
    }

    pub fn into_arc(self) -> Arc<dyn NodeObject>
    where
        B: 'static,
    {
        Arc::new(self)
    }
}

impl<B: BatchNodeBehavior> NodeObject for BatchNode<B> {
    fn run_unchecked(&mut self, shared: &Shared) -> Result<Action, NodeError> {
        let prep_result = self.behavior.prep(shared, &self.topology.params)?;
        let behavior = &self.behavior;
        let mut exec_results = Vec::with_capacity(prep_result.len());
        for item in &prep_result {
            let result = run_with_retry(
                item.clone(),
                self.max_retries,
                self.wait,
                |v, attempt| behavior.exec(v, attempt),
                |v, e| behavior.exec_fallback(v, e),
            )?;
            exec_results.push(result);
        }

        self.behavior
            .post(shared, prep_result, exec_results, &self.topology.params)
    }

    fn connect_on(&self, action: &str, successor: Arc<dyn NodeObject>) {
        self.topology.connect_on(action, successor);
    }

    fn successor_for(&self, action: &str) -> Option<Arc<dyn NodeObject>> {
        self.topology.successor_for(action)
    }

    fn successor_keys(&self) -> Vec<String> {
        self.topology.successor_keys()
    }

    fn has_successors(&self) -> bool {
        self.topology.has_successors()
    }

    fn set_params(&mut self, params: Params) {
        self.topology.params = params;
    }

    fn params(&self) -> Params {
        self.topology.params.clone()
    }

    fn name(&self) -> &str {
        self.behavior.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone)]
    struct ChunkSum;

    impl BatchNodeBehavior for ChunkSum {
        fn prep(&self, shared: &Shared, _params: &Params) -> Result<Vec<Value>, NodeError> {
            let array: Vec<i64> = shared.get_as("input_array").unwrap_or_default();
            Ok(array
                .chunks(10)
                .map(|chunk| json!(chunk.to_vec()))
                .collect())
        }

        fn exec(&self, item: Value, _attempt: usize) -> Result<Value, NodeError> {
            let chunk: Vec<i64> = serde_json::from_value(item)?;
            Ok(json!(chunk.iter().sum::<i64>()))
        }

        fn post(
            &self,
            shared: &Shared,
            _prep_result: Vec<Value>,
            exec_result: Vec<Value>,
            _params: &Params,
        ) -> Result<Action, NodeError> {
            shared.set("chunk_results", json!(exec_result));
            Ok(Action::default())
        }
    }

    #[test]
    fn chunked_sum_preserves_order_and_length() {
        let shared = Shared::new();
        shared.set("input_array", json!((0..25).collect::<Vec<i64>>()));

        let mut node = BatchNode::new(ChunkSum);
        node.run(&shared).unwrap();

        let results: Vec<i64> = shared.get_as("chunk_results").unwrap();
        assert_eq!(results, vec![45, 145, 110]);
    }

    #[test]
    fn empty_prep_still_invokes_post() {
        let shared = Shared::new();
        let mut node = BatchNode::new(ChunkSum);
        node.run(&shared).unwrap();
        let results: Vec<i64> = shared.get_as("chunk_results").unwrap();
        assert!(results.is_empty());
    }
}
