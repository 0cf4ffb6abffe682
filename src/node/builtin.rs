//! Basic utility nodes: logging, setting/getting a [`Shared`] value,
//! branching, waiting, and the array-chunk/sum-reduce pair used to
//! demonstrate map-reduce over a [`crate::core::BatchNode`].
//!
//! Grounded on the teacher's `node/builtin.rs::basic` module, minus the
//! `StorageBackend` type parameter the spec's Non-goals drop; the
//! chunk/reduce pair is grounded on `original_source/tests/test_batch_node.py`'s
//! `ArrayChunkNode`/`SumReduceNode` fixtures instead (the teacher has no
//! equivalent).

use std::time::Duration;

use serde_json::Value;

use crate::action::Action;
use crate::core::{BatchNodeBehavior, NodeBehavior};
use crate::error::NodeError;
use crate::params::Params;
use crate::shared::Shared;

/// Logs a message via `tracing::info!` and passes through to a fixed
/// action.
#[derive(Clone)]
pub struct LogNode {
    message: String,
    action: Action,
}

impl LogNode {
    pub fn new(message: impl Into<String>, action: Action) -> Self {
        Self {
            message: message.into(),
            action,
        }
    }
}

impl NodeBehavior for LogNode {
    fn exec(&self, _prep_result: Value, _attempt: usize) -> Result<Value, NodeError> {
        tracing::info!(message = %self.message, "LogNode");
        Ok(Value::Null)
    }

    fn post(
        &self,
        _shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        Ok(self.action.clone())
    }

    fn name(&self) -> &str {
        "LogNode"
    }
}

/// Writes a fixed key/value pair into [`Shared`] and moves on.
#[derive(Clone)]
pub struct SetValueNode {
    key: String,
    value: Value,
    action: Action,
}

impl SetValueNode {
    pub fn new(key: impl Into<String>, value: Value, action: Action) -> Self {
        Self {
            key: key.into(),
            value,
            action,
        }
    }
}

impl NodeBehavior for SetValueNode {
    fn post(
        &self,
        shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set(self.key.clone(), self.value.clone());
        Ok(self.action.clone())
    }

    fn name(&self) -> &str {
        "SetValueNode"
    }
}

/// Reads `key` from [`Shared`], applies `transform`, and writes the result
/// to `output_key`.
#[derive(Clone)]
pub struct GetValueNode<F>
where
    F: Fn(Option<Value>) -> Value + Send + Sync + Clone + 'static,
{
    key: String,
    output_key: String,
    transform: F,
    action: Action,
}

impl<F> GetValueNode<F>
where
    F: Fn(Option<Value>) -> Value + Send + Sync + Clone + 'static,
{
    pub fn new(
        key: impl Into<String>,
        output_key: impl Into<String>,
        transform: F,
        action: Action,
    ) -> Self {
        Self {
            key: key.into(),
            output_key: output_key.into(),
            transform,
            action,
        }
    }
}

impl<F> NodeBehavior for GetValueNode<F>
where
    F: Fn(Option<Value>) -> Value + Send + Sync + Clone + 'static,
{
    fn prep(&self, shared: &Shared, _params: &Params) -> Result<Value, NodeError> {
        Ok(shared.get(&self.key).unwrap_or(Value::Null))
    }

    fn exec(&self, prep_result: Value, _attempt: usize) -> Result<Value, NodeError> {
        let input = if prep_result.is_null() {
            None
        } else {
            Some(prep_result)
        };
        Ok((self.transform)(input))
    }

    fn post(
        &self,
        shared: &Shared,
        _prep_result: Value,
        exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set(self.output_key.clone(), exec_result);
        Ok(self.action.clone())
    }

    fn name(&self) -> &str {
        "GetValueNode"
    }
}

/// Evaluates `condition` against [`Shared`] and routes to `if_true` or
/// `if_false`.
#[derive(Clone)]
pub struct ConditionalNode<F>
where
    F: Fn(&Shared) -> bool + Send + Sync + Clone + 'static,
{
    condition: F,
    if_true: Action,
    if_false: Action,
}

impl<F> ConditionalNode<F>
where
    F: Fn(&Shared) -> bool + Send + Sync + Clone + 'static,
{
    pub fn new(condition: F, if_true: Action, if_false: Action) -> Self {
        Self {
            condition,
            if_true,
            if_false,
        }
    }
}

impl<F> NodeBehavior for ConditionalNode<F>
where
    F: Fn(&Shared) -> bool + Send + Sync + Clone + 'static,
{
    fn prep(&self, shared: &Shared, _params: &Params) -> Result<Value, NodeError> {
        Ok(Value::Bool((self.condition)(shared)))
    }

    fn exec(&self, prep_result: Value, _attempt: usize) -> Result<Value, NodeError> {
        Ok(prep_result)
    }

    fn post(
        &self,
        _shared: &Shared,
        _prep_result: Value,
        exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        if exec_result.as_bool().unwrap_or(false) {
            Ok(self.if_true.clone())
        } else {
            Ok(self.if_false.clone())
        }
    }

    fn name(&self) -> &str {
        "ConditionalNode"
    }
}

/// Blocks the current thread for `duration`, then routes to a fixed
/// action. A sync node sleeping with `std::thread::sleep` is fine here —
/// for a non-blocking wait inside an async graph, use
/// [`crate::async_core::AsyncNode`] with a behavior that calls
/// `tokio::time::sleep` directly instead of wrapping this one.
#[derive(Clone)]
pub struct DelayNode {
    duration: Duration,
    action: Action,
}

impl DelayNode {
    pub fn new(duration: Duration, action: Action) -> Self {
        Self { duration, action }
    }
}

impl NodeBehavior for DelayNode {
    fn exec(&self, _prep_result: Value, _attempt: usize) -> Result<Value, NodeError> {
        std::thread::sleep(self.duration);
        Ok(Value::Null)
    }

    fn post(
        &self,
        _shared: &Shared,
        _prep_result: Value,
        _exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        Ok(self.action.clone())
    }

    fn name(&self) -> &str {
        "DelayNode"
    }
}

/// Splits `input_array` (an array of integers under that key in
/// [`Shared`]) into fixed-size chunks and sums each chunk, storing the
/// ordered sums under `chunk_results`. Pair with [`SumReduceNode`] for a
/// full map-reduce pipeline.
#[derive(Clone)]
pub struct ArrayChunkNode {
    chunk_size: usize,
}

impl ArrayChunkNode {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

impl BatchNodeBehavior for ArrayChunkNode {
    fn prep(&self, shared: &Shared, _params: &Params) -> Result<Vec<Value>, NodeError> {
        let array: Vec<i64> = shared.get_as("input_array").unwrap_or_default();
        Ok(array
            .chunks(self.chunk_size.max(1))
            .map(|chunk| Value::from(chunk.to_vec()))
            .collect())
    }

    fn exec(&self, item: Value, _attempt: usize) -> Result<Value, NodeError> {
        let chunk: Vec<i64> = serde_json::from_value(item)?;
        Ok(Value::from(chunk.iter().sum::<i64>()))
    }

    fn post(
        &self,
        shared: &Shared,
        _prep_result: Vec<Value>,
        exec_result: Vec<Value>,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set("chunk_results", Value::from(exec_result));
        Ok(Action::default())
    }

    fn name(&self) -> &str {
        "ArrayChunkNode"
    }
}

/// Sums `chunk_results` from [`Shared`] into `total`.
#[derive(Clone)]
pub struct SumReduceNode;

impl NodeBehavior for SumReduceNode {
    fn prep(&self, shared: &Shared, _params: &Params) -> Result<Value, NodeError> {
        let chunk_results: Vec<i64> = shared.get_as("chunk_results").unwrap_or_default();
        Ok(Value::from(chunk_results))
    }

    fn exec(&self, prep_result: Value, _attempt: usize) -> Result<Value, NodeError> {
        let chunk_results: Vec<i64> = serde_json::from_value(prep_result)?;
        Ok(Value::from(chunk_results.iter().sum::<i64>()))
    }

    fn post(
        &self,
        shared: &Shared,
        _prep_result: Value,
        exec_result: Value,
        _params: &Params,
    ) -> Result<Action, NodeError> {
        shared.set("total", exec_result);
        Ok(Action::default())
    }

    fn name(&self) -> &str {
        "SumReduceNode"
    }
}
