use pocketflow_rs::prelude::*;
use serde_json::{json, Value};

#[derive(Clone)]
struct ChunkSum;

impl BatchNodeBehavior for ChunkSum {
    fn prep(&self, shared: &Shared, _params: &Params) -> Result<Vec<Value>, NodeError> {
        let array: Vec<i64> = shared.get_as("input_array").unwrap_or_default();
        Ok(array.chunks(10).map(|c| json!(c.to_vec())).collect())
    }

    fn exec(&self, item: Value, _attempt: usize) -> Result<Value, NodeError> {
        let chunk: Vec<i64> = serde_json::from_value(item)?;
        Ok(json!(chunk.iter().sum::<i64>()))
    }

    fn post(
        &self,
        shared: &Shared,
        _prep_result: Vec<Value>,
        exec_result: Vec<Value>,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set("chunk_results", json!(exec_result));
        Ok(Action::default())
    }
}

#[test]
fn batch_node_preserves_chunk_order() {
    let mut node = BatchNode::new(ChunkSum);
    let shared = Shared::new();
    shared.set("input_array", json!((0..25).collect::<Vec<i64>>()));

    node.run(&shared).unwrap();

    let results: Vec<i64> = shared.get_as("chunk_results").unwrap();
    assert_eq!(results, vec![45, 145, 110]);
}

#[test]
fn batch_node_empty_prep_still_posts() {
    let mut node = BatchNode::new(ChunkSum);
    let shared = Shared::new();
    node.run(&shared).unwrap();
    let results: Vec<i64> = shared.get_as("chunk_results").unwrap();
    assert!(results.is_empty());
}

#[derive(Clone)]
struct FailsOnFirstAttempt;

impl BatchNodeBehavior for FailsOnFirstAttempt {
    fn prep(&self, _shared: &Shared, _params: &Params) -> Result<Vec<Value>, NodeError> {
        Ok(vec![json!(1), json!(2), json!(3)])
    }

    fn exec(&self, item: Value, attempt: usize) -> Result<Value, NodeError> {
        if attempt == 0 {
            Err(NodeError::exec(0, "transient"))
        } else {
            Ok(item)
        }
    }

    fn post(
        &self,
        shared: &Shared,
        _prep_result: Vec<Value>,
        exec_result: Vec<Value>,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set("results", json!(exec_result));
        Ok(Action::default())
    }
}

#[test]
fn batch_node_retries_are_scoped_per_element() {
    let mut node = BatchNode::new(FailsOnFirstAttempt).with_max_retries(2);
    let shared = Shared::new();
    node.run(&shared).unwrap();
    let results: Vec<i64> = shared.get_as("results").unwrap();
    assert_eq!(results, vec![1, 2, 3]);
}

#[derive(Clone)]
struct RecordsThreeRegions;

impl BatchFlowBehavior for RecordsThreeRegions {
    fn prep(&self, _shared: &Shared, _params: &Params) -> Result<Vec<Params>, NodeError> {
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

#[derive(Clone)]
struct RecordRegionVisit;

impl NodeBehavior for RecordRegionVisit {
    fn post(
        &self,
        shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        params: &Params,
    ) -> Result<Action, NodeError> {
        let region: String = params.get("region").unwrap_or_default();
        let mut visited: Vec<String> = shared.get_as("visited").unwrap_or_default();
        visited.push(region);
        shared.set("visited", json!(visited));
        Ok(Action::default())
    }
}

#[test]
fn batch_flow_runs_inner_flow_once_per_record_in_order() {
    let node = Node::new(RecordRegionVisit).into_arc();
    let inner_flow = Flow::new(node);
    let batch_flow = BatchFlow::new(inner_flow, RecordsThreeRegions);

    let shared = Shared::new();
    batch_flow.run(&shared).unwrap();

    let visited: Vec<String> = shared.get_as("visited").unwrap();
    assert_eq!(visited, vec!["us", "eu", "ap"]);
}
