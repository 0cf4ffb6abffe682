//! Illustrative node implementations built on [`crate::core::NodeBehavior`]
//! and [`crate::core::BatchNodeBehavior`]. Gated behind `builtin-nodes`
//! since they are examples of how to write a behavior, not part of the
//! runtime itself.

pub mod builtin;
