//! Map-reduce over a sequential `BatchNode`: chunk an array, sum each
//! chunk, then reduce the chunk sums into a total.

use pocketflow_rs::prelude::*;
use serde_json::json;

fn main() {
    tracing_subscriber::fmt::init();

    let chunk = BatchNode::new(ArrayChunkNode::new(10)).into_arc();
    let reduce = Node::new(SumReduceNode).into_arc();
    let flow = Flow::new(chunk).connect_default(reduce);

    let shared = Shared::new();
    shared.set("input_array", json!((0..100).collect::<Vec<i64>>()));
    flow.run(&shared).expect("flow should not fail");

    let chunk_results: Vec<i64> = shared.get_as("chunk_results").unwrap();
    println!("chunk sums: {chunk_results:?}");
    println!("total: {}", shared.get("total").unwrap());
}
