//! A `Flow` is itself a node: this wires a small inner flow as a single
//! step inside a larger outer flow.

use pocketflow_rs::prelude::*;
use serde_json::{json, Value};

#[derive(Clone)]
struct Validate;

impl NodeBehavior for Validate {
    fn post(
        &self,
        shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set("validated", json!(true));
        Ok(Action::new("next"))
    }
}

#[derive(Clone)]
struct Normalize;

impl NodeBehavior for Normalize {
    fn post(
        &self,
        shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set("normalized", json!(true));
        Ok(Action::new("ready"))
    }
}

#[derive(Clone)]
struct Publish;

impl NodeBehavior for Publish {
    fn post(
        &self,
        shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set("published", json!(true));
        Ok(Action::default())
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let normalize = Node::new(Normalize).into_arc();
    let validate = Node::new(Validate).connect_on("next", normalize).into_arc();
    let preprocess = Flow::new(validate).into_arc();

    let publish = Node::new(Publish).into_arc();
    let pipeline = Flow::new(preprocess).connect_on("ready", publish);

    let shared = Shared::new();
    pipeline.run(&shared).expect("pipeline should not fail");

    assert_eq!(shared.get("validated"), Some(json!(true)));
    assert_eq!(shared.get("normalized"), Some(json!(true)));
    assert_eq!(shared.get("published"), Some(json!(true)));
    println!("pipeline complete: {:?}", shared.snapshot());
}
