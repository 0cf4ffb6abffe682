use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::node::AsyncNodeObject;
use super::AsyncTopology;
use crate::action::Action;
use crate::error::{FlowError, NodeError};
use crate::params::Params;
use crate::shared::Shared;

/// Async counterpart of [`crate::core::FlowBehavior`].
#[async_trait]
pub trait AsyncFlowBehavior: Send + Sync + Clone + 'static {
    async fn prep(&self, _shared: &Shared, _params: &Params) -> Result<Value, NodeError> {
        Ok(Value::Null)
    }

    async fn post(
        &self,
        _shared: &Shared,
        _prep_result: Value,
        last_action: Action,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        Ok(last_action)
    }
}

#[derive(Clone, Copy, Default)]
pub struct DefaultAsyncFlowBehavior;

#[async_trait]
impl AsyncFlowBehavior for DefaultAsyncFlowBehavior {}

/// Async counterpart of [`crate::core::Flow`]: walks a graph of
/// [`AsyncNodeObject`]s, awaiting each visited node's lifecycle in turn
/// (spec §4.4, §4.6). Also a [`AsyncNodeObject`] itself, so an `AsyncFlow`
/// composes as a node inside a larger async graph the same way a sync
/// `Flow` does.
#[derive(Clone)]
pub struct AsyncFlow<B: AsyncFlowBehavior = DefaultAsyncFlowBehavior> {
    start: Arc<dyn AsyncNodeObject>,
    behavior: B,
    topology: AsyncTopology,
}

impl AsyncFlow<DefaultAsyncFlowBehavior> {
    pub fn new(start: Arc<dyn AsyncNodeObject>) -> Self {
        Self::with_behavior(start, DefaultAsyncFlowBehavior)
    }
}

impl<B: AsyncFlowBehavior> AsyncFlow<B> {
    pub fn with_behavior(start: Arc<dyn AsyncNodeObject>, behavior: B) -> Self {
        Self {
            start,
            behavior,
            topology: AsyncTopology::default(),
        }
    }

    pub fn set_params(&mut self, params: Params) {
        self.topology.params = params;
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

    pub async fn run(&self, shared: &Shared) -> Result<Action, FlowError> {
        let prep_result = self
            .behavior
            .prep(shared, &self.topology.params)
            .await
            .map_err(FlowError::Node)?;

        let mut current: Option<Arc<dyn AsyncNodeObject>> = Some(self.start.clone());
        let mut last_action = Action::default();

        while let Some(node_arc) = current {
            let mut visit = dyn_clone::clone_box(&*node_arc);

            let merged = node_arc.params().merged_over(&self.topology.params);
            visit.set_params(merged);

            let action = visit.run_unchecked(shared).await.map_err(FlowError::Node)?;
            last_action = action.clone();

            let next = node_arc.successor_for(action.as_str());
            if next.is_none() && node_arc.has_successors() {
                tracing::warn!(
                    action = action.as_str(),
                    available = ?node_arc.successor_keys(),
                    "no successor registered for action"
                );
            }
            current = next;
        }

        self.behavior
            .post(shared, prep_result, last_action, &self.topology.params)
            .await
            .map_err(FlowError::Node)
    }
}

#[async_trait]
impl<B: AsyncFlowBehavior> AsyncNodeObject for AsyncFlow<B> {
    async fn run_unchecked(&mut self, shared: &Shared) -> Result<Action, NodeError> {
        AsyncFlow::run(self, shared)
            .await
            .map_err(|e| NodeError::Orchestration(e.to_string()))
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
        "async_flow"
    }
}

/// Async counterpart of [`crate::core::BatchFlowBehavior`].
#[async_trait]
pub trait AsyncBatchFlowBehavior: Send + Sync + Clone + 'static {
    async fn prep(&self, _shared: &Shared, _params: &Params) -> Result<Vec<Params>, NodeError> {
        Ok(Vec::new())
    }

    async fn post(
        &self,
        _shared: &Shared,
        _prep_result: Vec<Params>,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        Ok(Action::default())
    }
}

/// Runs its inner [`AsyncFlow`] once per parameter record, sequentially,
/// awaiting each iteration before starting the next (spec §4.5, §4.6).
#[derive(Clone)]
pub struct AsyncBatchFlow<FB: AsyncFlowBehavior, BB: AsyncBatchFlowBehavior> {
    flow: AsyncFlow<FB>,
    behavior: BB,
    topology: AsyncTopology,
}

impl<FB: AsyncFlowBehavior, BB: AsyncBatchFlowBehavior> AsyncBatchFlow<FB, BB> {
    pub fn new(flow: AsyncFlow<FB>, behavior: BB) -> Self {
        Self {
            flow,
            behavior,
            topology: AsyncTopology::default(),
        }
    }

    pub fn set_params(&mut self, params: Params) {
        self.topology.params = params;
    }

    pub fn into_arc(self) -> Arc<dyn AsyncNodeObject>
    where
        FB: 'static,
        BB: 'static,
    {
        Arc::new(self)
    }

    pub async fn run(&self, shared: &Shared) -> Result<Action, FlowError> {
        let records = self
            .behavior
            .prep(shared, &self.topology.params)
            .await
            .map_err(FlowError::Node)?;

        for record in &records {
            let merged = self.topology.params.merged_over(record);
            let mut iteration = self.flow.clone();
            iteration.set_params(merged);
            iteration.run(shared).await?;
        }

        self.behavior
            .post(shared, records, &self.topology.params)
            .await
            .map_err(FlowError::Node)
    }
}

#[async_trait]
impl<FB: AsyncFlowBehavior, BB: AsyncBatchFlowBehavior> AsyncNodeObject for AsyncBatchFlow<FB, BB> {
    async fn run_unchecked(&mut self, shared: &Shared) -> Result<Action, NodeError> {
        AsyncBatchFlow::run(self, shared)
            .await
            .map_err(|e| NodeError::Orchestration(e.to_string()))
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
        "async_batch_flow"
    }
}

/// Runs its inner [`AsyncFlow`] once per parameter record concurrently —
/// the parallel-fan-out counterpart of [`AsyncBatchFlow`] (spec §4.6). Each
/// iteration gets its own shallow-copied subgraph, so concurrent iterations
/// never alias node state; iterations still share the same `Shared`, so
/// callers remain responsible for key-disjointness across records just as
/// with [`AsyncParallelBatchNode`].
#[derive(Clone)]
pub struct AsyncParallelBatchFlow<FB: AsyncFlowBehavior, BB: AsyncBatchFlowBehavior> {
    flow: AsyncFlow<FB>,
    behavior: BB,
    topology: AsyncTopology,
}

impl<FB: AsyncFlowBehavior, BB: AsyncBatchFlowBehavior> AsyncParallelBatchFlow<FB, BB> {
    pub fn new(flow: AsyncFlow<FB>, behavior: BB) -> Self {
        Self {
            flow,
            behavior,
            topology: AsyncTopology::default(),
        }
    }

    pub fn set_params(&mut self, params: Params) {
        self.topology.params = params;
    }

    pub fn into_arc(self) -> Arc<dyn AsyncNodeObject>
    where
        FB: 'static,
        BB: 'static,
    {
        Arc::new(self)
    }

    pub async fn run(&self, shared: &Shared) -> Result<Action, FlowError> {
        let records = self
            .behavior
            .prep(shared, &self.topology.params)
            .await
            .map_err(FlowError::Node)?;

        let handles: Vec<_> = records
            .iter()
            .map(|record| {
                let merged = self.topology.params.merged_over(record);
                let mut iteration = self.flow.clone();
                iteration.set_params(merged);
                let shared = shared.clone();
                tokio::spawn(async move { iteration.run(&shared).await })
            })
            .collect();

        for handle in handles {
            match handle.await {
                Ok(result) => {
                    result?;
                }
                Err(join_err) => return Err(FlowError::Join(join_err.to_string())),
            }
        }

        self.behavior
            .post(shared, records, &self.topology.params)
            .await
            .map_err(FlowError::Node)
    }
}

#[async_trait]
impl<FB: AsyncFlowBehavior, BB: AsyncBatchFlowBehavior> AsyncNodeObject
    for AsyncParallelBatchFlow<FB, BB>
{
    async fn run_unchecked(&mut self, shared: &Shared) -> Result<Action, NodeError> {
        AsyncParallelBatchFlow::run(self, shared)
            .await
            .map_err(|e| NodeError::Orchestration(e.to_string()))
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
        "async_parallel_batch_flow"
    }
}
