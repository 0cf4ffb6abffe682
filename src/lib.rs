//! # pocketflow-rs
//!
//! A minimalist graph-based workflow runtime: nodes with a three-phase
//! `prep` / `exec` / `post` lifecycle, wired together by action-labeled
//! edges into a [`Flow`], communicating through a shared mutable
//! [`Shared`] context.
//!
//! ## Building blocks
//!
//! - [`Shared`] / [`Params`]: the mutable context threaded through a run,
//!   and the per-node configuration assigned immediately before each visit.
//! - [`core`]: the synchronous runtime — [`core::Node`], [`core::BatchNode`],
//!   [`core::Flow`], [`core::BatchFlow`].
//! - [`async_core`]: the async runtime, including the two variants that
//!   only make sense once execution can overlap —
//!   [`async_core::AsyncParallelBatchNode`] and
//!   [`async_core::AsyncParallelBatchFlow`]. A sync [`core::NodeBehavior`]
//!   drops into an async graph unchanged via [`async_core::AsyncNode`].
//! - [`node::builtin`] (feature `builtin-nodes`, on by default): small
//!   illustrative nodes — `LogNode`, `SetValueNode`, `GetValueNode`,
//!   `ConditionalNode`, `DelayNode`, `ArrayChunkNode`, `SumReduceNode`.
//!
//! ## Quick start
//!
//! ```
//! use pocketflow_rs::prelude::*;
//! use serde_json::json;
//!
//! #[derive(Clone)]
//! struct Greet;
//!
//! impl NodeBehavior for Greet {
//!     fn post(
//!         &self,
//!         shared: &Shared,
//!         _prep_result: serde_json::Value,
//!         _exec_result: serde_json::Value,
//!         _params: &Params,
//!     ) -> Result<Action, NodeError> {
//!         shared.set("greeting", json!("hello"));
//!         Ok(Action::default())
//!     }
//! }
//!
//! let mut node = Node::new(Greet);
//! let shared = Shared::new();
//! node.run(&shared).unwrap();
//! assert_eq!(shared.get("greeting"), Some(json!("hello")));
//! ```

pub mod action;
pub mod async_core;
pub mod core;
pub mod error;
pub mod params;
pub mod shared;

#[cfg(feature = "builtin-nodes")]
pub mod node;

pub use action::Action;
pub use error::{FlowError, NodeError};
pub use params::Params;
pub use shared::Shared;

pub use core::{BatchFlow, BatchFlowBehavior, BatchNode, BatchNodeBehavior, Flow, FlowBehavior, Node, NodeBehavior, NodeObject};
pub use async_core::{
    AsyncBatchFlow, AsyncBatchFlowBehavior, AsyncBatchNode, AsyncBatchNodeBehavior, AsyncFlow,
    AsyncFlowBehavior, AsyncNode, AsyncNodeBehavior, AsyncNodeObject, AsyncParallelBatchFlow,
    AsyncParallelBatchNode,
};

/// Convenient single import for the common types.
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::error::{FlowError, NodeError};
    pub use crate::params::Params;
    pub use crate::shared::Shared;

    pub use crate::core::{
        BatchFlow, BatchFlowBehavior, BatchNode, BatchNodeBehavior, Flow, FlowBehavior, Node,
        NodeBehavior, NodeObject,
    };
    pub use crate::async_core::{
        AsyncBatchFlow, AsyncBatchFlowBehavior, AsyncBatchNode, AsyncBatchNodeBehavior, AsyncFlow,
        AsyncFlowBehavior, AsyncNode, AsyncNodeBehavior, AsyncNodeObject, AsyncParallelBatchFlow,
        AsyncParallelBatchNode,
    };

    #[cfg(feature = "builtin-nodes")]
    pub use crate::node::builtin::{
        ArrayChunkNode, ConditionalNode, DelayNode, GetValueNode, LogNode, SetValueNode,
        SumReduceNode,
    };

    pub use serde_json::Value as JsonValue;
}
