//! Computation Graph
//!
//! This module implements the graph itself: node storage, wiring, the
//! per-node state machine, and stale propagation.
//!
//! # Overview
//!
//! The graph is a mutable directed graph of named nodes. Input nodes hold
//! externally supplied values; derived nodes hold a function of their
//! predecessors. Edges bind a predecessor's output to a specific argument
//! (positional or keyword) of a successor's function.
//!
//! # Design Decisions
//!
//! 1. Nodes live in an arena (dense slots + free list) with a name lookup
//!    table. Edges are index pairs, deletion is O(1) bookkeeping, and a node
//!    demoted to a placeholder keeps its slot so successor wiring stays
//!    valid.
//!
//! 2. We maintain both forward (successor) and reverse (predecessor) edges
//!    to make downward invalidation and upward ancestor closure each a
//!    single traversal.
//!
//! 3. Reverse indexes from tag and state to node-sets are updated alongside
//!    every mutation, so membership queries never scan the store.

mod engine;
mod node;
mod propagate;
mod store;

pub(crate) use node::{InputSlot, NodeIdx};

pub use engine::{ComputationGraph, Input, NodeDefinition};
pub use node::{NodePayload, NodeState, ParameterBinding, Timing};
