//! The smallest possible graph: one node, no edges.

use pocketflow_rs::prelude::*;
use serde_json::{json, Value};

#[derive(Clone)]
struct Greet;

impl NodeBehavior for Greet {
    fn post(
        &self,
        shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set("greeting", json!("hello, pocketflow"));
        Ok(Action::default())
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let mut node = Node::new(Greet);
    let shared = Shared::new();
    node.run(&shared).expect("node should not fail");

    println!("{}", shared.get("greeting").unwrap());
}
