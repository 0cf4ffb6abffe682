use std::sync::Arc;

use serde_json::Value;

use super::node::NodeObject;
use super::Topology;
use crate::action::Action;
use crate::error::{FlowError, NodeError};
use crate::params::Params;
use crate::shared::Shared;

/// Optional hooks around a [`Flow`]'s own run, mirroring a node's prep/post
/// (spec §4.4 step 1 and step 4). Most flows don't need either — the
/// default is a no-op prep and a post that passes the final action through
/// unchanged, so a `Flow` is transparent to whatever routes it as a node.
pub trait FlowBehavior: Send + Sync + Clone + 'static {
    fn prep(&self, _shared: &Shared, _params: &Params) -> Result<Value, NodeError> {
        Ok(Value::Null)
    }

    fn post(
        &self,
        _shared: &Shared,
        _prep_result: Value,
        last_action: Action,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        Ok(last_action)
    }
}

/// The default, no-op [`FlowBehavior`] used by [`Flow::new`].
#[derive(Clone, Copy, Default)]
pub struct DefaultFlowBehavior;

impl FlowBehavior for DefaultFlowBehavior {}

/// Orchestrates a graph of [`NodeObject`]s rooted at a `start` node,
/// following action-labeled edges until a branch terminates (spec §4.4).
///
/// A `Flow` is itself a [`NodeObject`] (spec §3 "Flow-as-node"): its own
/// `run` *is* "walk my subgraph to completion", so embedding a `Flow` as a
/// successor in another graph just works. There is deliberately no way to
/// call a bare "exec" on a `Flow` directly — the only entry points are
/// `run` (this module) and, for an embedded flow, the `NodeObject::run`
/// that delegates to it.
#[derive(Clone)]
pub struct Flow<B: FlowBehavior = DefaultFlowBehavior> {
    start: Arc<dyn NodeObject>,
    behavior: B,
    topology: Topology,
}

impl Flow<DefaultFlowBehavior> {
    pub fn new(start: Arc<dyn NodeObject>) -> Self {
        Self::with_behavior(start, DefaultFlowBehavior)
    }
}

impl<B: FlowBehavior> Flow<B> {
    pub fn with_behavior(start: Arc<dyn NodeObject>, behavior: B) -> Self {
        Self {
            start,
            behavior,
            topology: Topology::default(),
        }
    }

    pub fn set_params(&mut self, params: Params) {
        self.topology.params = params;
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

    /// Run this flow's subgraph to completion, returning the last action
    /// observed (spec §4.4).
    pub fn run(&self, shared: &Shared) -> Result<Action, FlowError> {
        let prep_result = self
            .behavior
            .prep(shared, &self.topology.params)
            .map_err(FlowError::Node)?;

        let mut current: Option<Arc<dyn NodeObject>> = Some(self.start.clone());
        let mut last_action = Action::default();

        while let Some(node_arc) = current {
            // Step (a): shallow copy — topology (the `Arc`-shared successor
            // table) carries over untouched; params/retry-attempt state is
            // freshly forked so concurrent or repeated visits never alias.
            let mut visit = dyn_clone::clone_box(&*node_arc);

            // Step (b): flow's current params win over the node's static
            // ones.
            let merged = node_arc.params().merged_over(&self.topology.params);
            visit.set_params(merged);

            // Step (c)/(d): run the lifecycle; normalize the action. Uses
            // `run_unchecked` — this is an orchestrated visit, not the
            // standalone single-node case `NodeObject::run` warns about.
            let action = visit.run_unchecked(shared).map_err(FlowError::Node)?;
            last_action = action.clone();

            // Step (e): look up the *original* node's edge table.
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
            .map_err(FlowError::Node)
    }
}

impl<B: FlowBehavior> NodeObject for Flow<B> {
    fn run_unchecked(&mut self, shared: &Shared) -> Result<Action, NodeError> {
        Flow::run(self, shared).map_err(|e| NodeError::Orchestration(e.to_string()))
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
        "flow"
    }
}

/// What a user implements for a batch flow: `prep` returns the sequence of
/// per-iteration parameter records (spec §4.5).
pub trait BatchFlowBehavior: Send + Sync + Clone + 'static {
    fn prep(&self, _shared: &Shared, _params: &Params) -> Result<Vec<Params>, NodeError> {
        Ok(Vec::new())
    }

    /// Fires once at the end with the original prep sequence and no
    /// aggregate exec result — the source's own behavior, not an invented
    /// aggregation (spec §9 open question).
    fn post(
        &self,
        _shared: &Shared,
        _prep_result: Vec<Params>,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        Ok(Action::default())
    }
}

/// A [`Flow`] re-run once per parameter record produced by its own `prep`
/// (spec §4.5). Each iteration gets a fresh shallow copy of the subgraph —
/// consistently, unlike the source's documented aliasing of the start
/// node's params across iterations (spec §9 open question; resolved here
/// by always going through `Flow::run`'s own per-visit copying).
#[derive(Clone)]
pub struct BatchFlow<FB: FlowBehavior, BB: BatchFlowBehavior> {
    flow: Flow<FB>,
    behavior: BB,
    topology: Topology,
}

impl<FB: FlowBehavior, BB: BatchFlowBehavior> BatchFlow<FB, BB> {
    pub fn new(flow: Flow<FB>, behavior: BB) -> Self {
        Self {
            flow,
            behavior,
            topology: Topology::default(),
        }
    }

    pub fn set_params(&mut self, params: Params) {
        self.topology.params = params;
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
        FB: 'static,
        BB: 'static,
    {
        Arc::new(self)
    }

    pub fn run(&self, shared: &Shared) -> Result<Action, FlowError> {
        let records = self
            .behavior
            .prep(shared, &self.topology.params)
            .map_err(FlowError::Node)?;

        for record in &records {
            let merged = self.topology.params.merged_over(record);
            let mut iteration = self.flow.clone();
            iteration.set_params(merged);
            iteration.run(shared)?;
        }

        self.behavior
            .post(shared, records, &self.topology.params)
            .map_err(FlowError::Node)
    }
}

impl<FB: FlowBehavior, BB: BatchFlowBehavior> NodeObject for BatchFlow<FB, BB> {
    fn run_unchecked(&mut self, shared: &Shared) -> Result<Action, NodeError> {
        BatchFlow::run(self, shared).map_err(|e| NodeError::Orchestration(e.to_string()))
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
        "batch_flow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::node::{Node, NodeBehavior};
    use crate::params::Params;
    use serde_json::json;

    #[derive(Clone)]
    struct RouteOnFlag;

    impl NodeBehavior for RouteOnFlag {
        fn post(
            &self,
            shared: &Shared,
            _prep_result: Value,
            _exec_result: Value,
            _params: &Params,
        ) -> Result<Action, NodeError> {
            let branch: String = shared.get_as("branch").unwrap_or_else(|| "b".to_string());
            Ok(Action::new(branch))
        }
    }

    #[derive(Clone)]
    struct RecordVisit(&'static str);

    impl NodeBehavior for RecordVisit {
        fn post(
            &self,
            shared: &Shared,
            _prep_result: Value,
            _exec_result: Value,
            _params: &Params,
        ) -> Result<Action, NodeError> {
            shared.set("visited", json!(self.0));
            Ok(Action::default())
        }
    }

    #[test]
    fn routes_on_returned_action() {
        let b = Node::new(RecordVisit("b")).into_arc();
        let c = Node::new(RecordVisit("c")).into_arc();
        let a = Node::new(RouteOnFlag)
            .connect_on("b", b)
            .connect_on("c", c)
            .into_arc();

        let flow = Flow::new(a);

        let shared = Shared::new();
        shared.set("branch", json!("c"));
        flow.run(&shared).unwrap();
        assert_eq!(shared.get("visited"), Some(json!("c")));

        let shared2 = Shared::new();
        shared2.set("branch", json!("b"));
        flow.run(&shared2).unwrap();
        assert_eq!(shared2.get("visited"), Some(json!("b")));
    }

    #[test]
    fn unknown_action_terminates_branch_without_error() {
        let b = Node::new(RecordVisit("b")).into_arc();
        let a = Node::new(RouteOnFlag).connect_on("b", b).into_arc();
        let flow = Flow::new(a);

        let shared = Shared::new();
        shared.set("branch", json!("d"));
        let action = flow.run(&shared).unwrap();
        assert_eq!(action.as_str(), "d");
        assert_eq!(shared.get("visited"), None);
    }

    #[test]
    fn overwriting_edge_keeps_new_successor() {
        let first = Node::new(RecordVisit("first")).into_arc();
        let second = Node::new(RecordVisit("second")).into_arc();
        let a = Node::new(RouteOnFlag)
            .connect_on("b", first)
            .connect_on("b", second)
            .into_arc();
        let flow = Flow::new(a);

        let shared = Shared::new();
        shared.set("branch", json!("b"));
        flow.run(&shared).unwrap();
        assert_eq!(shared.get("visited"), Some(json!("second")));
    }
}
