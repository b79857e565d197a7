//! State Propagation
//!
//! The invalidation half of the engine. Inserting a value (or completing a
//! computation, see the dispatch loop) cascades `Stale` through strict
//! descendants, skipping pinned nodes, and re-checks direct successors for
//! promotion to `Computable`.
//!
//! # Pinning
//!
//! A pinned node's value is frozen: no cascade touches it, and inserting
//! into it replaces the value without unfreezing it. The only way out is an
//! explicit unpin, which is exactly `set_stale`.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::error::GraphError;

use super::engine::ComputationGraph;
use super::node::{NodeIdx, NodePayload, NodeState};

impl<T> ComputationGraph<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Insert an externally supplied value.
    ///
    /// A no-op when the node is already `UpToDate` with an equal value.
    /// Otherwise the node becomes `UpToDate`, every strict descendant not
    /// pinned becomes `Stale`, and direct successors are re-checked for
    /// promotion. Timing is untouched: it describes computations only.
    pub fn insert(&mut self, name: &str, value: T) -> Result<(), GraphError>
    where
        T: PartialEq,
    {
        let idx = self.idx_or_err(name)?;
        {
            let node = self.store.node(idx);
            if node.state == NodeState::UpToDate && node.payload.value() == Some(&value) {
                trace!(node = %name, "insert is a no-op");
                return Ok(());
            }
        }
        self.apply_inserts(vec![(idx, value)]);
        debug!(node = %name, "inserted value");
        Ok(())
    }

    /// Insert unconditionally, skipping the equal-value no-op check.
    pub fn insert_force(&mut self, name: &str, value: T) -> Result<(), GraphError> {
        let idx = self.idx_or_err(name)?;
        self.apply_inserts(vec![(idx, value)]);
        debug!(node = %name, "inserted value (forced)");
        Ok(())
    }

    /// Insert several values as one step.
    ///
    /// The invalidation cascade is computed against the pre-insertion graph
    /// for all pairs at once, and inserted names are excluded from the stale
    /// and promotion side-effect sets. Inserting a node together with one of
    /// its own descendants therefore does not spuriously mark the descendant
    /// stale.
    pub fn insert_many<I, S>(&mut self, pairs: I) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
    {
        let mut resolved = Vec::new();
        for (name, value) in pairs {
            resolved.push((self.idx_or_err(name.as_ref())?, value));
        }
        if resolved.is_empty() {
            return Ok(());
        }
        debug!(count = resolved.len(), "inserting values");
        self.apply_inserts(resolved);
        Ok(())
    }

    /// Mark a node and its descendants stale.
    ///
    /// The named node itself is set `Stale` unconditionally, which is how
    /// unpin works; pinned descendants are skipped as usual. The node is
    /// then re-checked for promotion, so a stale node whose predecessors are
    /// all current goes straight back to `Computable`.
    pub fn set_stale(&mut self, name: &str) -> Result<(), GraphError> {
        let idx = self.idx_or_err(name)?;
        self.store.set_state(idx, NodeState::Stale);
        let descendants = self.store.descendants([idx]);
        self.mark_stale(descendants.into_iter().filter(|&d| d != idx));
        self.try_promote(idx);
        debug!(node = %name, "marked stale");
        Ok(())
    }

    /// Freeze a node in its current value. A pinned node is never
    /// auto-invalidated by propagation.
    pub fn pin(&mut self, name: &str) -> Result<(), GraphError> {
        let idx = self.idx_or_err(name)?;
        self.store.set_state(idx, NodeState::Pinned);
        debug!(node = %name, "pinned");
        Ok(())
    }

    /// Insert a value, then freeze the node on it.
    pub fn pin_value(&mut self, name: &str, value: T) -> Result<(), GraphError> {
        let idx = self.idx_or_err(name)?;
        self.apply_inserts(vec![(idx, value)]);
        self.store.set_state(idx, NodeState::Pinned);
        debug!(node = %name, "pinned with value");
        Ok(())
    }

    /// Release a pinned node. Exactly `set_stale`.
    pub fn unpin(&mut self, name: &str) -> Result<(), GraphError> {
        self.set_stale(name)
    }

    // ------------------------------------------------------------------------
    // Internals shared with definition and dispatch
    // ------------------------------------------------------------------------

    /// Set values and run the cascade: descendants (computed before any
    /// mutation, seeds excluded) go `Stale` unless pinned, then direct
    /// successors outside the seed set are re-checked for promotion.
    pub(crate) fn apply_inserts(&mut self, pairs: Vec<(NodeIdx, T)>) {
        let seeds: HashSet<NodeIdx> = pairs.iter().map(|(idx, _)| *idx).collect();
        let stale: Vec<NodeIdx> = self
            .store
            .descendants(seeds.iter().copied())
            .into_iter()
            .filter(|idx| !seeds.contains(idx))
            .collect();

        for (idx, value) in pairs {
            let pinned = self.store.node(idx).state == NodeState::Pinned;
            self.store.node_mut(idx).payload = NodePayload::Computed(value);
            if !pinned {
                self.store.set_state(idx, NodeState::UpToDate);
            }
        }

        self.mark_stale(stale);

        let successors: HashSet<NodeIdx> = seeds
            .iter()
            .flat_map(|&seed| {
                self.store
                    .node(seed)
                    .successors
                    .iter()
                    .copied()
                    .collect::<Vec<_>>()
            })
            .filter(|succ| !seeds.contains(succ))
            .collect();
        for succ in successors {
            self.try_promote(succ);
        }
    }

    /// Cascade `Stale` over the given nodes, skipping pinned ones.
    pub(crate) fn mark_stale(&mut self, nodes: impl IntoIterator<Item = NodeIdx>) {
        for idx in nodes {
            if self.store.node(idx).state != NodeState::Pinned {
                self.store.set_state(idx, NodeState::Stale);
            }
        }
    }

    /// Promote a node to `Computable` if it is eligible: never from
    /// `Pinned`, only with a function, and only once every graph-bound
    /// predecessor is current.
    pub(crate) fn try_promote(&mut self, idx: NodeIdx) -> bool {
        let ready = {
            let node = self.store.node(idx);
            matches!(node.state, NodeState::Uninitialized | NodeState::Stale)
                && node.has_function()
                && node
                    .bound_inputs()
                    .all(|pred| self.store.node(pred).state.is_current())
        };
        if ready {
            self.store.set_state(idx, NodeState::Computable);
            trace!(node = %self.store.node(idx).name, "promoted to computable");
        }
        ready
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
