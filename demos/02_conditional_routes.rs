//! Branching with `ConditionalNode`: the same flow takes a different path
//! depending on what's already in `Shared` when it starts.

use pocketflow_rs::prelude::*;
use serde_json::{json, Value};

#[derive(Clone)]
struct ReportApproved;

impl NodeBehavior for ReportApproved {
    fn post(
        &self,
        shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set("outcome", json!("approved"));
        Ok(Action::default())
    }
}

#[derive(Clone)]
struct ReportRejected;

impl NodeBehavior for ReportRejected {
    fn post(
        &self,
        shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set("outcome", json!("rejected"));
        Ok(Action::default())
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let approved = Node::new(ReportApproved).into_arc();
    let rejected = Node::new(ReportRejected).into_arc();
    let gate = Node::new(ConditionalNode::new(
        |shared: &Shared| shared.get("score").and_then(|v| v.as_i64()).unwrap_or(0) >= 50,
        Action::new("approved"),
        Action::new("rejected"),
    ))
    .connect_on("approved", approved)
    .connect_on("rejected", rejected)
    .into_arc();

    let flow = Flow::new(gate);

    let shared = Shared::new();
    shared.set("score", json!(72));
    flow.run(&shared).expect("flow should not fail");
    println!("score 72 -> {}", shared.get("outcome").unwrap());

    let shared = Shared::new();
    shared.set("score", json!(30));
    flow.run(&shared).expect("flow should not fail");
    println!("score 30 -> {}", shared.get("outcome").unwrap());
}
