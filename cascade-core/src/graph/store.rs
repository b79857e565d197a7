//! Node Store
//!
//! Arena storage for the graph. Nodes live in dense slots addressed by
//! [`NodeIdx`], with a name lookup table and free-list reuse of deleted
//! slots. Edges are index pairs, so worker threads can be handed plain
//! values and never see the store itself.
//!
//! The store also owns the two reverse indexes the accessor layer queries:
//! tag -> node-set and state -> node-set. Both are updated alongside every
//! mutation and never recomputed, except when the graph is explicitly
//! copied.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use super::node::{Node, NodeIdx, NodeState};

pub(crate) struct NodeStore<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<u32>,
    lookup: IndexMap<String, NodeIdx>,
    tag_index: HashMap<String, HashSet<NodeIdx>>,
    state_index: HashMap<NodeState, HashSet<NodeIdx>>,
}

impl<T> NodeStore<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            lookup: IndexMap::new(),
            tag_index: HashMap::new(),
            state_index: HashMap::new(),
        }
    }

    /// Number of live nodes.
    pub(crate) fn len(&self) -> usize {
        self.lookup.len()
    }

    pub(crate) fn idx_of(&self, name: &str) -> Option<NodeIdx> {
        self.lookup.get(name).copied()
    }

    pub(crate) fn node(&self, idx: NodeIdx) -> &Node<T> {
        self.slots[idx.index()]
            .as_ref()
            .expect("live NodeIdx points at an occupied slot")
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIdx) -> &mut Node<T> {
        self.slots[idx.index()]
            .as_mut()
            .expect("live NodeIdx points at an occupied slot")
    }

    /// The index for `name`, creating a placeholder slot if the name is new.
    pub(crate) fn ensure(&mut self, name: &str) -> NodeIdx {
        if let Some(idx) = self.idx_of(name) {
            return idx;
        }
        let node = Node::placeholder(name.to_string());
        let idx = match self.free.pop() {
            Some(slot) => {
                let idx = NodeIdx(slot);
                self.slots[idx.index()] = Some(node);
                idx
            }
            None => {
                let idx = NodeIdx(self.slots.len() as u32);
                self.slots.push(Some(node));
                idx
            }
        };
        self.lookup.insert(name.to_string(), idx);
        self.state_index
            .entry(NodeState::Placeholder)
            .or_default()
            .insert(idx);
        idx
    }

    /// Set a node's state, keeping the state index consistent.
    pub(crate) fn set_state(&mut self, idx: NodeIdx, state: NodeState) {
        let old = {
            let node = self.node_mut(idx);
            let old = node.state;
            node.state = state;
            old
        };
        if old != state {
            if let Some(set) = self.state_index.get_mut(&old) {
                set.remove(&idx);
            }
            self.state_index.entry(state).or_default().insert(idx);
        }
    }

    /// Replace a node's tags, keeping the tag index consistent.
    pub(crate) fn set_tags(&mut self, idx: NodeIdx, tags: HashSet<String>) {
        let old = std::mem::take(&mut self.node_mut(idx).tags);
        for tag in &old {
            if let Some(set) = self.tag_index.get_mut(tag) {
                set.remove(&idx);
                if set.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
        for tag in &tags {
            self.tag_index.entry(tag.clone()).or_default().insert(idx);
        }
        self.node_mut(idx).tags = tags;
    }

    /// Wire `pred` into `succ`. Binding details live in `succ`'s input slots;
    /// this records the index pair on both sides.
    pub(crate) fn add_edge(&mut self, pred: NodeIdx, succ: NodeIdx) {
        self.node_mut(pred).successors.insert(succ);
        self.node_mut(succ).predecessors.insert(pred);
    }

    /// Detach every predecessor edge of `idx`, returning the former
    /// predecessors so the caller can prune orphaned placeholders.
    ///
    /// Input slots are left to the caller: a redefinition replaces them
    /// wholesale anyway.
    pub(crate) fn drop_predecessor_edges(&mut self, idx: NodeIdx) -> Vec<NodeIdx> {
        let preds: Vec<NodeIdx> = std::mem::take(&mut self.node_mut(idx).predecessors)
            .into_iter()
            .collect();
        for &pred in &preds {
            self.node_mut(pred).successors.remove(&idx);
        }
        preds
    }

    /// Remove a node outright. The caller must have detached its edges.
    pub(crate) fn remove(&mut self, idx: NodeIdx) {
        self.set_tags(idx, HashSet::new());
        let node = self.slots[idx.index()]
            .take()
            .expect("live NodeIdx points at an occupied slot");
        self.lookup.shift_remove(&node.name);
        if let Some(set) = self.state_index.get_mut(&node.state) {
            set.remove(&idx);
        }
        self.free.push(idx.0);
    }

    /// Live nodes in definition order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (NodeIdx, &Node<T>)> {
        self.lookup.values().map(move |&idx| (idx, self.node(idx)))
    }

    pub(crate) fn nodes_in_state(&self, state: NodeState) -> impl Iterator<Item = NodeIdx> + '_ {
        self.state_index
            .get(&state)
            .into_iter()
            .flatten()
            .copied()
    }

    pub(crate) fn nodes_with_tag<'a>(&'a self, tag: &str) -> impl Iterator<Item = NodeIdx> + 'a {
        self.tag_index.get(tag).into_iter().flatten().copied()
    }

    /// Whether the slot behind `idx` is still occupied.
    pub(crate) fn is_live(&self, idx: NodeIdx) -> bool {
        self.slots
            .get(idx.index())
            .map_or(false, |slot| slot.is_some())
    }

    /// Strict descendants of the seed set: every node reachable through one
    /// or more successor edges. Seeds themselves appear only if a cycle
    /// leads back to them.
    pub(crate) fn descendants<I>(&self, seeds: I) -> HashSet<NodeIdx>
    where
        I: IntoIterator<Item = NodeIdx>,
    {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<NodeIdx> = seeds
            .into_iter()
            .flat_map(|idx| self.node(idx).successors.iter().copied())
            .collect();

        while let Some(idx) = queue.pop_front() {
            if visited.insert(idx) {
                queue.extend(self.node(idx).successors.iter().copied());
            }
        }
        visited
    }

    /// Rebuild both reverse indexes from the slots. Only used by `copy`.
    pub(crate) fn rebuild_indexes(&mut self) {
        self.tag_index.clear();
        self.state_index.clear();
        for &idx in self.lookup.values() {
            let node = self.slots[idx.index()]
                .as_ref()
                .expect("live NodeIdx points at an occupied slot");
            self.state_index.entry(node.state).or_default().insert(idx);
            for tag in &node.tags {
                self.tag_index.entry(tag.clone()).or_default().insert(idx);
            }
        }
    }
}

impl<T: Clone> NodeStore<T> {
    /// Structural clone. Values are cloned with `T::clone`; functions are
    /// shared through their `Arc`. Indexes are rebuilt from scratch.
    pub(crate) fn copy(&self) -> Self {
        let mut copied = Self {
            slots: self.slots.clone(),
            free: self.free.clone(),
            lookup: self.lookup.clone(),
            tag_index: HashMap::new(),
            state_index: HashMap::new(),
        };
        copied.rebuild_indexes();
        copied
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
