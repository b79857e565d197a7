//! Cascade Core
//!
//! This crate provides the core engine for Cascade, an incremental
//! computation framework. It implements:
//!
//! - A mutable directed graph of named nodes, mixing externally supplied
//!   values with values derived by functions of their predecessors
//! - A per-node state machine with automatic stale propagation, so only the
//!   out-of-date part of a graph is ever recomputed
//! - Concurrent dispatch over thread-pool executors, with per-node routing
//!   to named pools
//! - Partial-failure containment: a failing node is captured in place and
//!   independent branches keep computing
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: the graph itself — node storage, wiring, the state machine,
//!   and stale propagation
//! - `exec`: executors and the first-completion dispatch loop
//! - `func`: the node-function trait, parameter signatures, and argument
//!   resolution
//! - `error`: the error taxonomy and captured failure records
//!
//! # Example
//!
//! ```rust,ignore
//! use cascade_core::{ComputationGraph, ComputeOpts, NodeDefinition, node_fn2};
//!
//! let mut graph = ComputationGraph::new();
//! graph.define_node(NodeDefinition::new("a").initial_value(2))?;
//! graph.define_node(NodeDefinition::new("b").initial_value(3))?;
//! graph.define_node(NodeDefinition::new("c")
//!     .function(node_fn2("a", "b", |a: i64, b: i64| Ok(a + b))))?;
//!
//! graph.compute(["c"], ComputeOpts::default())?;
//! assert_eq!(graph.value("c")?, &5);
//!
//! // Changing an input invalidates exactly its descendants.
//! graph.insert("a", 10)?;
//! graph.compute(["c"], ComputeOpts::default())?;
//! assert_eq!(graph.value("c")?, &13);
//! ```

pub mod error;
pub mod exec;
pub mod func;
pub mod graph;

pub use error::{ErrorRecord, GraphError, NodeError};
pub use exec::{ComputeOpts, Executor, ExecutorSet};
pub use func::{
    node_fn0, node_fn1, node_fn2, CallArgs, FnNode, NodeFunc, ParameterSignature,
};
pub use graph::{
    ComputationGraph, Input, NodeDefinition, NodePayload, NodeState, ParameterBinding, Timing,
};
