use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::batch::{run_element_with_retry, AsyncBatchNodeBehavior};
use super::node::AsyncNodeObject;
use super::AsyncTopology;
use crate::action::Action;
use crate::error::NodeError;
use crate::params::Params;
use crate::shared::Shared;

/// Fans `exec` out over every element of `prep`'s sequence concurrently
/// (`tokio::spawn` per element), preserves prep order in the aggregated
/// result, and cancels the remaining in-flight elements on the first
/// failure observed while collecting results in that same prep order (spec
/// §4.6). "First observed" here means first-in-prep-order, not
/// first-by-wall-clock-completion — the spec itself leaves completion
/// order unspecified, so iterating in a fixed order is the only way to get
/// deterministic cancellation behavior.
#[derive(Clone)]
pub struct AsyncParallelBatchNode<B: AsyncBatchNodeBehavior> {
    behavior: B,
    topology: AsyncTopology,
    max_retries: usize,
    wait: Duration,
}

impl<B: AsyncBatchNodeBehavior> AsyncParallelBatchNode<B> {
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
impl<B: AsyncBatchNodeBehavior> AsyncNodeObject for AsyncParallelBatchNode<B> {
    async fn run_unchecked(&mut self, shared: &Shared) -> Result<Action, NodeError> {
        let prep_result = self.behavior.prep(shared, &self.topology.params).await?;

        let handles: Vec<_> = prep_result
            .iter()
            .map(|item| {
                let behavior = self.behavior.clone();
                let item = item.clone();
                let max_retries = self.max_retries;
                let wait = self.wait;
                tokio::spawn(async move {
                    run_element_with_retry(&behavior, item, max_retries, wait).await
                })
            })
            .collect();

        let mut exec_results = Vec::with_capacity(handles.len());
        let mut first_error: Option<NodeError> = None;

        let mut handles = handles.into_iter();
        for handle in handles.by_ref() {
            if first_error.is_some() {
                handle.abort();
                continue;
            }
            match handle.await {
                Ok(Ok(v)) => exec_results.push(v),
                Ok(Err(e)) => first_error = Some(e),
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => first_error = Some(NodeError::exec(0, join_err.to_string())),
            }
        }

        if let Some(e) = first_error {
            return Err(e);
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct DoubleEach {
        started: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AsyncBatchNodeBehavior for DoubleEach {
        async fn prep(&self, shared: &Shared, _params: &Params) -> Result<Vec<Value>, NodeError> {
            let items: Vec<i64> = shared.get_as("items").unwrap_or_default();
            Ok(items.into_iter().map(|i| json!(i)).collect())
        }

        async fn exec(&self, item: Value, _attempt: usize) -> Result<Value, NodeError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let n: i64 = serde_json::from_value(item)?;
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(json!(n * 2))
        }

        async fn post(
            &self,
            shared: &Shared,
            _prep_result: Vec<Value>,
            exec_result: Vec<Value>,
            _params: &Params,
        ) -> Result<Action, NodeError> {
            shared.set("doubled", json!(exec_result));
            Ok(Action::default())
        }
    }

    #[tokio::test]
    async fn concurrent_execution_preserves_order() {
        let shared = Shared::new();
        shared.set("items", json!([1, 2, 3, 4, 5]));

        let started = Arc::new(AtomicUsize::new(0));
        let mut node = AsyncParallelBatchNode::new(DoubleEach { started: started.clone() });
        node.run(&shared).await.unwrap();

        let doubled: Vec<i64> = shared.get_as("doubled").unwrap();
        assert_eq!(doubled, vec![2, 4, 6, 8, 10]);
        assert_eq!(started.load(Ordering::SeqCst), 5);
    }

    #[derive(Clone)]
    struct FailOnThree;

    #[async_trait]
    impl AsyncBatchNodeBehavior for FailOnThree {
        async fn prep(&self, shared: &Shared, _params: &Params) -> Result<Vec<Value>, NodeError> {
            let items: Vec<i64> = shared.get_as("items").unwrap_or_default();
            Ok(items.into_iter().map(|i| json!(i)).collect())
        }

        async fn exec(&self, item: Value, _attempt: usize) -> Result<Value, NodeError> {
            let n: i64 = serde_json::from_value(item)?;
            tokio::time::sleep(Duration::from_millis(5)).await;
            if n == 3 {
                return Err(NodeError::exec(0, "three is unlucky"));
            }
            Ok(json!(n))
        }
    }

    #[tokio::test]
    async fn first_prep_order_failure_propagates() {
        let shared = Shared::new();
        shared.set("items", json!([1, 2, 3, 4, 5]));

        let mut node = AsyncParallelBatchNode::new(FailOnThree);
        let result = node.run(&shared).await;
        assert!(result.is_err());
    }
}
