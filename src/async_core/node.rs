use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dyn_clone::DynClone;
use serde_json::Value;

use super::AsyncTopology;
use crate::action::Action;
use crate::core::NodeBehavior;
use crate::error::NodeError;
use crate::params::Params;
use crate::shared::Shared;

/// Async counterpart of [`crate::core::NodeBehavior`]. Implemented directly
/// for behaviors that need to `.await` inside a phase (an HTTP call, an LLM
/// request, `tokio::time::sleep`), and blanket-implemented for every
/// synchronous [`NodeBehavior`] so sync and async node authors can sit in
/// the same graph.
#[async_trait]
pub trait AsyncNodeBehavior: Send + Sync + Clone + 'static {
    async fn prep(&self, _shared: &Shared, _params: &Params) -> Result<Value, NodeError> {
        Ok(Value::Null)
    }

    async fn exec(&self, _prep_result: Value, _attempt: usize) -> Result<Value, NodeError> {
        Ok(Value::Null)
    }

    async fn post(
        &self,
        _shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        Ok(Action::default())
    }

    async fn exec_fallback(
        &self,
        _prep_result: Value,
        error: NodeError,
    ) -> Result<Value, NodeError> {
        Err(error)
    }

    fn name(&self) -> &str {
        "async_node"
    }
}

/// Runs any sync [`NodeBehavior`] through the async lifecycle by invoking
/// its phases inline — no suspension happens, but it satisfies the trait
/// so a sync-authored node can be wrapped with [`AsyncNode::new`] and
/// connected into an [`crate::async_core::AsyncFlow`] graph unchanged.
#[async_trait]
impl<T: NodeBehavior> AsyncNodeBehavior for T {
    async fn prep(&self, shared: &Shared, params: &Params) -> Result<Value, NodeError> {
        NodeBehavior::prep(self, shared, params)
    }

    async fn exec(&self, prep_result: Value, attempt: usize) -> Result<Value, NodeError> {
        NodeBehavior::exec(self, prep_result, attempt)
    }

    async fn post(
        &self,
        shared: &Shared,
        prep_result: Value,
        exec_result: Value,
        params: &Params,
    ) -> Result<Action, NodeError> {
        NodeBehavior::post(self, shared, prep_result, exec_result, params)
    }

    async fn exec_fallback(&self, prep_result: Value, error: NodeError) -> Result<Value, NodeError> {
        NodeBehavior::exec_fallback(self, prep_result, error)
    }

    fn name(&self) -> &str {
        NodeBehavior::name(self)
    }
}

/// Object-safe async counterpart of [`crate::core::NodeObject`].
#[async_trait]
pub trait AsyncNodeObject: DynClone + Send + Sync {
    /// Invoke prep -> exec (with retry) -> post. Intended for standalone
    /// single-node testing; warns if the node has successors, since only an
    /// `AsyncFlow` can reach them. An `AsyncFlow` itself never calls this —
    /// it calls `run_unchecked` so routing through the orchestrator doesn't
    /// trip the misuse warning on every ordinary visit.
    async fn run(&mut self, shared: &Shared) -> Result<Action, NodeError> {
        if self.has_successors() {
            tracing::warn!(
                node = self.name(),
                "run() invoked on a node with successors; use an AsyncFlow to reach them"
            );
        }
        self.run_unchecked(shared).await
    }

    /// Invoke prep -> exec (with retry) -> post without the standalone-misuse
    /// warning. This is the entry point `AsyncFlow`/`AsyncBatchFlow` use for
    /// every node visit during ordinary orchestrated execution.
    async fn run_unchecked(&mut self, shared: &Shared) -> Result<Action, NodeError>;

    fn connect_on(&self, action: &str, successor: Arc<dyn AsyncNodeObject>);

    fn connect_default(&self, successor: Arc<dyn AsyncNodeObject>) {
        self.connect_on("default", successor);
    }

    fn successor_for(&self, action: &str) -> Option<Arc<dyn AsyncNodeObject>>;
    fn successor_keys(&self) -> Vec<String>;
    fn has_successors(&self) -> bool;

    fn set_params(&mut self, params: Params);
    fn params(&self) -> Params;

    fn name(&self) -> &str {
        "async_node"
    }
}

dyn_clone::clone_trait_object!(AsyncNodeObject);

/// Shared retry loop for a single exec/fallback pair, used by both
/// [`AsyncNode`] and [`crate::async_core::AsyncBatchNode`] (per element).
pub(crate) async fn run_with_retry_async<B: AsyncNodeBehavior>(
    behavior: &B,
    prep_result: Value,
    max_retries: usize,
    wait: Duration,
) -> Result<Value, NodeError> {
    let max = max_retries.max(1);
    for attempt in 0..max {
        match behavior.exec(prep_result.clone(), attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt + 1 == max {
                    return behavior.exec_fallback(prep_result, e).await;
                }
                if wait > Duration::ZERO {
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
    unreachable!("max_retries.max(1) guarantees at least one iteration")
}

/// Concrete async node: an [`AsyncNodeBehavior`] plus an edge table, retry
/// knobs, and per-visit params (the async mirror of [`crate::core::Node`]).
#[derive(Clone)]
pub struct AsyncNode<B: AsyncNodeBehavior> {
    behavior: B,
    topology: AsyncTopology,
    max_retries: usize,
    wait: Duration,
}

impl<B: AsyncNodeBehavior> AsyncNode<B> {
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

    pub fn behavior(&self) -> &B {
        &self.behavior
    }
}

#[async_trait]
impl<B: AsyncNodeBehavior> AsyncNodeObject for AsyncNode<B> {
    async fn run_unchecked(&mut self, shared: &Shared) -> Result<Action, NodeError> {
        let prep_result = self.behavior.prep(shared, &self.topology.params).await?;
        let exec_result = run_with_retry_async(
            &self.behavior,
            prep_result.clone(),
            self.max_retries,
            self.wait,
        )
        .await?;
        self.behavior
            .post(shared, prep_result, exec_result, &self.topology.params)
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
    struct AsyncAlwaysFails {
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AsyncNodeBehavior for AsyncAlwaysFails {
        async fn exec(&self, _prep_result: Value, _attempt: usize) -> Result<Value, NodeError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(1)).await;
            Err(NodeError::exec(0, "boom"))
        }
    }

    #[tokio::test]
    async fn retries_exhaust_then_propagate() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let mut node = AsyncNode::new(AsyncAlwaysFails {
            attempts: attempts.clone(),
        })
        .with_max_retries(3);

        let shared = Shared::new();
        let result = node.run(&shared).await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[derive(Clone)]
    struct SyncSetsValue;

    impl NodeBehavior for SyncSetsValue {
        fn post(
            &self,
            shared: &Shared,
            _prep_result: Value,
            _exec_result: Value,
            _params: &Params,
        ) -> Result<Action, NodeError> {
            shared.set("ran", json!(true));
            Ok(Action::new("next"))
        }
    }

    #[tokio::test]
    async fn sync_behavior_runs_inline_through_async_node() {
        let mut node = AsyncNode::new(SyncSetsValue);
        let shared = Shared::new();
        let action = node.run(&shared).await.unwrap();
        assert_eq!(action.as_str(), "next");
        assert_eq!(shared.get("ran"), Some(json!(true)));
    }
}
