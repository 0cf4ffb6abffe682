//! Crate-wide error types.
//!
//! Mirrors the teacher's composition style: one `thiserror` enum per concern
//! (`NodeError` for lifecycle/exec failures, `FlowError` for orchestration
//! failures).

use thiserror::Error;

/// Errors raised from a single node's lifecycle phases.
#[derive(Debug, Error)]
pub enum NodeError {
    /// `prep` failed.
    #[error("prep failed: {0}")]
    Prep(String),

    /// `exec` failed. Carries the attempt number (0-based) it failed on.
    #[error("exec failed on attempt {attempt}: {message}")]
    Exec { attempt: usize, message: String },

    /// `exec_fallback` failed (or re-raised) after retries were exhausted.
    #[error("exec_fallback failed after exhausting retries: {0}")]
    Fallback(String),

    /// `post` failed.
    #[error("post failed: {0}")]
    Post(String),

    /// A value pulled from `Shared` or `Params` didn't deserialize to the
    /// type the node expected.
    #[error("deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A `Flow`/`BatchFlow` embedded as a node failed. Carries the
    /// underlying `FlowError`'s message rather than the error itself, to
    /// avoid a circular dependency between `NodeError` and `FlowError`.
    #[error("embedded flow failed: {0}")]
    Orchestration(String),
}

impl NodeError {
    pub fn exec(attempt: usize, message: impl Into<String>) -> Self {
        NodeError::Exec {
            attempt,
            message: message.into(),
        }
    }
}

/// Errors raised by the orchestrator (`Flow` / `AsyncFlow` and their batch
/// variants).
#[derive(Debug, Error)]
pub enum FlowError {
    /// A node in the currently-running graph failed.
    #[error(transparent)]
    Node(#[from] NodeError),

    /// One or more concurrent batch-element/record tasks panicked or were
    /// cancelled unexpectedly (tokio join error), rather than returning a
    /// normal `NodeError`.
    #[error("concurrent task join failed: {0}")]
    Join(String),
}
