//! Graph Nodes
//!
//! This module defines the vocabulary of the computation graph: the per-node
//! state machine, the tagged value payload, parameter bindings, and the node
//! record itself.
//!
//! # States
//!
//! A node moves through a small state machine:
//!
//! - `Placeholder`: referenced by a binding but never defined. Illegal to
//!   compute through.
//! - `Uninitialized`: defined, but holds no value yet.
//! - `Stale`: previously computed, but an ancestor changed.
//! - `Computable`: has a function and every graph-bound predecessor is
//!   `UpToDate`; ready to run.
//! - `UpToDate`: the cached value is current.
//! - `Error`: the last computation failed; the payload holds the record.
//! - `Pinned`: the value is frozen by explicit caller action and immune to
//!   cascading invalidation. Only an explicit unpin reverts it to `Stale`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::ErrorRecord;
use crate::func::NodeFunc;

/// Index of a node slot in the arena. Stable across redefinition and
/// demotion, so edges held by successors never dangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeIdx(pub(crate) u32);

impl NodeIdx {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    Placeholder,
    Uninitialized,
    Stale,
    Computable,
    UpToDate,
    Error,
    Pinned,
}

impl NodeState {
    /// States whose cached value satisfies successors.
    ///
    /// A `Pinned` node counts: its frozen value is deliberately treated as
    /// current by the promotion rule.
    pub fn is_current(self) -> bool {
        matches!(self, NodeState::UpToDate | NodeState::Pinned)
    }
}

/// How an edge feeds a successor's function: as the argument at a position,
/// or as a keyword argument by parameter name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterBinding {
    Positional(usize),
    Keyword(String),
}

/// The value slot of a node.
///
/// Errors never overload the value: a failed node holds `Failed`, a computed
/// or inserted node holds `Computed`, everything else is `Empty`.
#[derive(Debug, Clone)]
pub enum NodePayload<T> {
    Empty,
    Computed(T),
    Failed(ErrorRecord),
}

impl<T> NodePayload<T> {
    /// The computed value, if there is one.
    pub fn value(&self) -> Option<&T> {
        match self {
            NodePayload::Computed(v) => Some(v),
            _ => None,
        }
    }

    /// The failure record, if the last computation failed.
    pub fn error(&self) -> Option<&ErrorRecord> {
        match self {
            NodePayload::Failed(record) => Some(record),
            _ => None,
        }
    }
}

/// Wall-clock timing of a node's last successful computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub start: SystemTime,
    pub end: SystemTime,
    pub duration: Duration,
}

/// One declared input of a node: either an inline constant or a reference to
/// a predecessor slot.
#[derive(Debug, Clone)]
pub(crate) enum InputSlot<T> {
    Constant(T),
    Node(NodeIdx),
}

impl<T> InputSlot<T> {
    pub(crate) fn node(&self) -> Option<NodeIdx> {
        match self {
            InputSlot::Node(idx) => Some(*idx),
            InputSlot::Constant(_) => None,
        }
    }
}

/// A node record in the arena.
///
/// Edge bookkeeping is doubled: a node knows the slots feeding it (through
/// its input slots) and the successors it feeds, so both invalidation
/// (downward) and ancestor closure (upward) are single traversals.
#[derive(Clone)]
pub(crate) struct Node<T> {
    pub(crate) name: String,
    pub(crate) state: NodeState,
    pub(crate) payload: NodePayload<T>,
    pub(crate) func: Option<Arc<dyn NodeFunc<T>>>,
    pub(crate) positional: SmallVec<[InputSlot<T>; 4]>,
    pub(crate) keyword: IndexMap<String, InputSlot<T>>,
    pub(crate) group: Option<String>,
    pub(crate) tags: HashSet<String>,
    pub(crate) executor: Option<String>,
    pub(crate) timing: Option<Timing>,
    pub(crate) predecessors: HashSet<NodeIdx>,
    pub(crate) successors: HashSet<NodeIdx>,
}

impl<T> Node<T> {
    /// A bare placeholder: referenced, never defined.
    pub(crate) fn placeholder(name: String) -> Self {
        Self {
            name,
            state: NodeState::Placeholder,
            payload: NodePayload::Empty,
            func: None,
            positional: SmallVec::new(),
            keyword: IndexMap::new(),
            group: None,
            tags: HashSet::new(),
            executor: None,
            timing: None,
            predecessors: HashSet::new(),
            successors: HashSet::new(),
        }
    }

    /// Graph-bound inputs in argument order: positional slots first, then
    /// keyword slots in binding order. Constants are skipped.
    pub(crate) fn bound_inputs(&self) -> impl Iterator<Item = NodeIdx> + '_ {
        self.positional
            .iter()
            .filter_map(InputSlot::node)
            .chain(self.keyword.values().filter_map(InputSlot::node))
    }

    pub(crate) fn has_function(&self) -> bool {
        self.func.is_some()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("payload", &self.payload)
            .field("has_function", &self.has_function())
            .field("predecessors", &self.predecessors.len())
            .field("successors", &self.successors.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
