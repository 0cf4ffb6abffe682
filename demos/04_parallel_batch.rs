//! `AsyncParallelBatchNode`: fan `exec` out over every element concurrently
//! while keeping the aggregated result in prep order.

use async_trait::async_trait;
use pocketflow_rs::prelude::*;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Clone)]
struct FetchAndDouble;

#[async_trait]
impl AsyncBatchNodeBehavior for FetchAndDouble {
    async fn prep(&self, shared: &Shared, _params: &Params) -> Result<Vec<Value>, NodeError> {
        let ids: Vec<i64> = shared.get_as("ids").unwrap_or_default();
        Ok(ids.into_iter().map(|i| json!(i)).collect())
    }

    async fn exec(&self, item: Value, _attempt: usize) -> Result<Value, NodeError> {
        // Simulates a latency-bound call that benefits from overlapping.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let n: i64 = serde_json::from_value(item)?;
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

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut node = AsyncParallelBatchNode::new(FetchAndDouble);
    let shared = Shared::new();
    shared.set("ids", json!([1, 2, 3, 4, 5, 6, 7, 8]));

    let started = std::time::Instant::now();
    node.run(&shared).await.expect("node should not fail");
    println!("elapsed: {:?}", started.elapsed());
    println!("doubled: {:?}", shared.get("doubled").unwrap());
}
