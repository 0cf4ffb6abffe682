use std::sync::Arc;
use std::time::Duration;

use dyn_clone::DynClone;
use serde_json::Value;

use super::Topology;
use crate::action::Action;
use crate::error::NodeError;
use crate::params::Params;
use crate::shared::Shared;

/// What a user implements to define a node's computation. The runtime
/// (`Node<B>`) supplies the edge table, retry/backoff, and the `run`
/// lifecycle around this.
///
/// All phases are optional: the defaults are no-ops returning the neutral
/// value, matching spec §4.1 ("All are optional; defaults are no-ops
/// returning the neutral action").
pub trait NodeBehavior: Send + Sync + Clone + 'static {
    /// Read (never mutate) `shared` and produce the input `exec` will see.
    fn prep(&self, _shared: &Shared, _params: &Params) -> Result<Value, NodeError> {
        Ok(Value::Null)
    }

    /// Perform the node's work. Sees only `prep`'s output, never `shared`
    /// directly — this is the testability contract from spec §4.1.
    /// `attempt` is the current 0-based retry attempt, exposed so
    /// attempt-aware logic is possible without hidden state (spec §4.2).
    fn exec(&self, _prep_result: Value, _attempt: usize) -> Result<Value, NodeError> {
        Ok(Value::Null)
    }

    /// Mutate `shared` and return the action that selects the next node.
    fn post(
        &self,
        _shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        Ok(Action::default())
    }

    /// Invoked once retries are exhausted. Default re-raises the original
    /// failure; override for graceful degradation (spec §4.2).
    fn exec_fallback(&self, _prep_result: Value, error: NodeError) -> Result<Value, NodeError> {
        Err(error)
    }

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "node"
    }
}

/// The object-safe contract a `Flow` walks: a node with an edge table, a
/// single-visit `run`, and params assignable by the orchestrator.
pub trait NodeObject: DynClone + Send + Sync {
    /// Invoke prep -> exec (with retry) -> post. Intended for standalone
    /// single-node testing; warns if the node has successors, since only a
    /// `Flow` can reach them (spec §4.1, §4.7). A `Flow` itself never calls
    /// this — it calls `run_unchecked` so routing through the orchestrator
    /// doesn't trip the misuse warning on every ordinary visit.
    fn run(&mut self, shared: &Shared) -> Result<Action, NodeError> {
        if self.has_successors() {
            tracing::warn!(
                node = self.name(),
                "run() invoked on a node with successors; use a Flow to reach them"
            );
        }
        self.run_unchecked(shared)
    }

    /// Invoke prep -> exec (with retry) -> post without the standalone-misuse
    /// warning. This is the entry point `Flow`/`BatchFlow` use for every
    /// node visit during ordinary orchestrated execution.
    fn run_unchecked(&mut self, shared: &Shared) -> Result<Action, NodeError>;

    fn connect_on(&self, action: &str, successor: Arc<dyn NodeObject>);

    fn connect_default(&self, successor: Arc<dyn NodeObject>) {
        self.connect_on("default", successor);
    }

    fn successor_for(&self, action: &str) -> Option<Arc<dyn NodeObject>>;
    fn successor_keys(&self) -> Vec<String>;
    fn has_successors(&self) -> bool;

    fn set_params(&mut self, params: Params);
    fn params(&self) -> Params;

    fn name(&self) -> &str {
        "node"
    }
}

dyn_clone::clone_trait_object!(NodeObject);

/// Runs `max_retries.max(1)` attempts of `exec_fn`, waiting `wait` between
/// failed attempts, falling back to `fallback_fn` once exhausted. Shared by
/// `Node` and `BatchNode` (per-element) so both get identical retry
/// semantics from one place (spec §4.2, applied "per element" for batches
/// per §4.3).
pub(crate) fn run_with_retry(
    prep_result: Value,
    max_retries: usize,
    wait: Duration,
    mut exec_fn: impl FnMut(Value, usize) -> Result<Value, NodeError>,
    mut fallback_fn: impl FnMut(Value, NodeError) -> Result<Value, NodeError>,
) -> Result<Value, NodeError> {
    let max = max_retries.max(1);
    for attempt in 0..max {
        match exec_fn(prep_result.clone(), attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt + 1 == max {
                    return fallback_fn(prep_result, e);
                }
                if wait > Duration::ZERO {
                    std::thread::sleep(wait);
                }
            }
        }
    }
    unreachable!("max_retries.max(1) guarantees at least one iteration")
}

/// Concrete node: a [`NodeBehavior`] plus an edge table, retry knobs, and
/// per-visit params. Grounded on the teacher's `Node<B, S>` wrapper
/// (`node/mod.rs`), minus the storage-backend type parameter the spec's
/// Non-goals drop.
#[derive(Clone)]
pub struct Node<B: NodeBehavior> {
    behavior: B,
    topology: Topology,
    max_retries: usize,
    wait: Duration,
}

impl<B: NodeBehavior> Node<B> {
    pub fn new(behavior: B) -> Self {
        Self {
            behavior,
            topology: Topology::default(),
            max_retries: 1,
            wait: Duration::ZERO,
        }
    }

    /// `max_retries >= 1`; `1` means "no retry" (spec §4.2).
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

    pub fn behavior(&self) -> &B {
        &self.behavior
    }
}

impl<B: NodeBehavior> NodeObject for Node<B> {
    fn run_unchecked(&mut self, shared: &Shared) -> Result<Action, NodeError> {
        let prep_result = self.behavior.prep(shared, &self.topology.params)?;
        let behavior = &self.behavior;
        let exec_result = run_with_retry(
            prep_result.clone(),
            self.max_retries,
            self.wait,
            |v, attempt| behavior.exec(v, attempt),
            |v, e| behavior.exec_fallback(v, e),
        )?;
        self.behavior
            .post(shared, prep_result, exec_result, &self.topology.params)
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
