use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::node::AsyncNodeObject;
use super::AsyncTopology;
use crate::action::Action;
use crate::error::NodeError;
use crate::params::Params;
use crate::shared::Shared;

/// Async counterpart of [`crate::core::BatchNodeBehavior`]: `prep` returns
/// an ordered sequence, `exec` runs once per element, awaited sequentially
/// in order (spec §4.3/§4.6 "sequential await" variant).
#[async_trait]
pub trait AsyncBatchNodeBehavior: Send + Sync + Clone + 'static {
    async fn prep(&self, _shared: &Shared, _params: &Params) -> Result<Vec<Value>, NodeError> {
        Ok(Vec::new())
    }

    async fn exec(&self, _item: Value, _attempt: usize) -> Result<Value, NodeError> {
        Ok(Value::Null)
    }

    async fn post(
        &self,
        _shared: &Shared,
        _prep_result: Vec<Value>,
        _exec_result: Vec<Value>,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        Ok(Action::default())
    }

    async fn exec_fallback(&self, _item: Value, error: NodeError) -> Result<Value, NodeError> {
        Err(error)
    }

    fn name(&self) -> &str {
        "async_batch_node"
    }
}

/// Sequentially awaits `exec` once per element of `prep`'s sequence, in
/// order — each element gets its own retry/fallback, same as the sync
/// [`crate::core::BatchNode`] but with every phase awaited.
#[derive(Clone)]
pub struct AsyncBatchNode<B: AsyncBatchNodeBehavior> {
    behavior: B,
    topology: AsyncTopology,
    max_retries: usize,
    wait: Duration,
}

impl<B: AsyncBatchNodeBehavior> AsyncBatchNode<B> {
    pub fn new(behavior: B) -> Self {
        Self {
            behavior,
            topology: AsyncTopology::default(),
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

    pub fn connect_default(self, successor: Arc<dyn AsyncNodeObject>) -> Self {
        self.topology.connect_on("default", successor);
        self
    }

    pub fn connect_on(self, action: &str, successor: Arc<dyn AsyncNodeObject>) -> Self {
        self.topology.connect_on(action, successor);
        self
    }

    pub fn into_arc(self) -> Arc<dyn AsyncNodeObject>
    where
        B: 'static,
    {
        Arc::new(self)
    }
}

#[async_trait]
impl<B: AsyncBatchNodeBehavior> AsyncNodeObject for AsyncBatchNode<B> {
    async fn run_unchecked(&mut self, shared: &Shared) -> Result<Action, NodeError> {
        let prep_result = self.behavior.prep(shared, &self.topology.params).await?;
        let mut exec_results = Vec::with_capacity(prep_result.len());
        for item in &prep_result {
            let result =
                run_element_with_retry(&self.behavior, item.clone(), self.max_retries, self.wait)
                    .await?;
            exec_results.push(result);
        }

        self.behavior
            .post(shared, prep_result, exec_results, &self.topology.params)
            .await
    }

    fn connect_on(&self, action: &str, successor: Arc<dyn AsyncNodeObject>) {
        self.topology.connect_on(action, successor);
    }

    fn successor_for(&self, action: &str) -> Option<Arc<dyn AsyncNodeObject>> {
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

/// Per-element retry loop, scoped to a single batch item (spec §4.3
/// "retries apply per element, not across the batch"). Kept separate from
/// [`super::node::run_with_retry_async`] since that one is written against
/// [`super::node::AsyncNodeBehavior`]'s single-value exec/fallback, not the
/// per-item signature batch behaviors use.
pub(crate) async fn run_element_with_retry<B: AsyncBatchNodeBehavior>(
    behavior: &B,
    item: Value,
    max_retries: usize,
    wait: Duration,
) -> Result<Value, NodeError> {
    let max = max_retries.max(1);
    for attempt in 0..max {
        match behavior.exec(item.clone(), attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt + 1 == max {
                    return behavior.exec_fallback(item, e).await;
                }
                if wait > Duration::ZERO {
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
    unreachable!("max_retries.max(1) guarantees at least one iteration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone)]
    struct AsyncChunkSum;

    #[async_trait]
    impl AsyncBatchNodeBehavior for AsyncChunkSum {
        async fn prep(&self, shared: &Shared, _params: &Params) -> Result<Vec<Value>, NodeError> {
            let array: Vec<i64> = shared.get_as("input_array").unwrap_or_default();
            Ok(array.chunks(10).map(|c| json!(c.to_vec())).collect())
        }

        async fn exec(&self, item: Value, _attempt: usize) -> Result<Value, NodeError> {
            let chunk: Vec<i64> = serde_json::from_value(item)?;
            Ok(json!(chunk.iter().sum::<i64>()))
        }

        async fn post(
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

    #[tokio::test]
    async fn sequential_batch_preserves_order() {
        let shared = Shared::new();
        shared.set("input_array", json!((0..25).collect::<Vec<i64>>()));

        let mut node = AsyncBatchNode::new(AsyncChunkSum);
        node.run(&shared).await.unwrap();

        let results: Vec<i64> = shared.get_as("chunk_results").unwrap();
        assert_eq!(results, vec![45, 145, 110]);
    }
}
