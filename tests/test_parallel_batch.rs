use async_trait::async_trait;
use pocketflow_rs::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
struct SquareEach {
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

#[async_trait]
impl AsyncBatchNodeBehavior for SquareEach {
    async fn prep(&self, shared: &Shared, _params: &Params) -> Result<Vec<Value>, NodeError> {
        let items: Vec<i64> = shared.get_as("items").unwrap_or_default();
        Ok(items.into_iter().map(|i| json!(i)).collect())
    }

    async fn exec(&self, item: Value, _attempt: usize) -> Result<Value, NodeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let n: i64 = serde_json::from_value(item)?;
        Ok(json!(n * n))
    }

    async fn post(
        &self,
        shared: &Shared,
        _prep_result: Vec<Value>,
        exec_result: Vec<Value>,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set("squared", json!(exec_result));
        Ok(Action::default())
    }
}

#[tokio::test]
async fn parallel_batch_node_overlaps_work_and_keeps_order() {
    let shared = Shared::new();
    shared.set("items", json!([1, 2, 3, 4, 5, 6]));

    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let mut node = AsyncParallelBatchNode::new(SquareEach {
        in_flight: Arc::new(AtomicUsize::new(0)),
        max_in_flight: max_in_flight.clone(),
    });

    node.run(&shared).await.unwrap();

    let squared: Vec<i64> = shared.get_as("squared").unwrap();
    assert_eq!(squared, vec![1, 4, 9, 16, 25, 36]);
    assert!(
        max_in_flight.load(Ordering::SeqCst) > 1,
        "elements should have overlapped, not run one at a time"
    );
}

#[derive(Clone)]
struct FailOnNegative;

#[async_trait]
impl AsyncBatchNodeBehavior for FailOnNegative {
    async fn prep(&self, shared: &Shared, _params: &Params) -> Result<Vec<Value>, NodeError> {
        let items: Vec<i64> = shared.get_as("items").unwrap_or_default();
        Ok(items.into_iter().map(|i| json!(i)).collect())
    }

    async fn exec(&self, item: Value, _attempt: usize) -> Result<Value, NodeError> {
        let n: i64 = serde_json::from_value(item)?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        if n < 0 {
            return Err(NodeError::exec(0, "negative input"));
        }
        Ok(json!(n))
    }
}

#[tokio::test]
async fn parallel_batch_node_propagates_failure_and_skips_post() {
    let shared = Shared::new();
    shared.set("items", json!([1, 2, -3, 4]));

    let mut node = AsyncParallelBatchNode::new(FailOnNegative);
    let result = node.run(&shared).await;
    assert!(result.is_err());
    assert_eq!(shared.get("squared"), None);
}

#[derive(Clone)]
struct WriteRegionResult;

#[async_trait]
impl AsyncNodeBehavior for WriteRegionResult {
    async fn post(
        &self,
        shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        params: &Params,
    ) -> Result<Action, NodeError> {
        let region: String = params.get("region").unwrap_or_default();
        let mut done: Vec<String> = shared.get_as("regions_done").unwrap_or_default();
        done.push(region);
        shared.set("regions_done", json!(done));
        Ok(Action::default())
    }
}

#[derive(Clone)]
struct ThreeRegionRecords;

#[async_trait]
impl AsyncBatchFlowBehavior for ThreeRegionRecords {
    async fn prep(&self, _shared: &Shared, _params: &Params) -> Result<Vec<Params>, NodeError> {
        ["us", "eu", "ap"]
            .iter()
            .map(|region| {
                let mut p = Params::new();
                p.set("region", *region)?;
                Ok(p)
            })
            .collect()
    }
}

#[tokio::test]
async fn parallel_batch_flow_runs_every_record_with_disjoint_keys() {
    let node = AsyncNode::new(WriteRegionResult).into_arc();
    let inner_flow = AsyncFlow::new(node);
    let parallel_flow = AsyncParallelBatchFlow::new(inner_flow, ThreeRegionRecords);

    let shared = Shared::new();
    parallel_flow.run(&shared).await.unwrap();

    let mut done: Vec<String> = shared.get_as("regions_done").unwrap();
    done.sort();
    assert_eq!(done, vec!["ap", "eu", "us"]);
}
