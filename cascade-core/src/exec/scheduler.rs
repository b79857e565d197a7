//! Dispatch Loop
//!
//! A compute pass collects the stale ancestor closure of the targets,
//! rejects ancestors that can never produce a value, promotes whatever is
//! ready in topological order, and then runs the dispatch loop: submit
//! every computable node to its executor, block until the first completion,
//! apply the result, cascade staleness, promote and submit newly ready
//! members of the working set, until nothing is in flight.
//!
//! Completions arrive in any order, but a node is never submitted before
//! its graph-bound predecessors are current, so causal ordering holds. A
//! failing node is contained by default: it lands in `Error` with its
//! record and independent branches keep computing; `raise_exceptions`
//! aborts on the first failure instead. Graph edits are never checked for
//! acyclicity; a cycle surfaces here as a node completing twice within one
//! pass, which fails the call with `CycleDetected`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant, SystemTime};

use crossbeam_channel::Sender;
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::error::{ErrorRecord, GraphError};
use crate::func::CallArgs;
use crate::graph::{ComputationGraph, InputSlot, NodeIdx, NodePayload, NodeState, Timing};

/// Options for a compute pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeOpts {
    /// Abort the pass on the first node failure instead of capturing it as
    /// an `Error` state and continuing with unrelated branches.
    pub raise_exceptions: bool,
}

impl ComputeOpts {
    /// Options with `raise_exceptions` set.
    pub fn raising() -> Self {
        Self {
            raise_exceptions: true,
        }
    }
}

/// The message a worker sends back for one finished node.
struct Completion<T> {
    idx: NodeIdx,
    started: SystemTime,
    finished: SystemTime,
    duration: Duration,
    outcome: Result<T, ErrorRecord>,
}

impl<T> ComputationGraph<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Bring the given target nodes up to date, computing only the stale
    /// part of their ancestor closure.
    pub fn compute<I, S>(&mut self, targets: I, opts: ComputeOpts) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut target_idxs = Vec::new();
        for target in targets {
            target_idxs.push(self.idx_or_err(target.as_ref())?);
        }

        let working = self.stale_ancestor_closure(&target_idxs);
        self.validate_closure(&working, &target_idxs)?;

        let order = self.topo_order(&working);
        for idx in order {
            self.try_promote(idx);
        }

        debug!(nodes = working.len(), "compute pass starting");
        self.dispatch(&working, opts)
    }

    /// Run the dispatch loop over every node currently computable, with the
    /// whole graph as working set, until nothing more can be computed.
    pub fn compute_all(&mut self, opts: ComputeOpts) -> Result<(), GraphError> {
        let working: HashSet<NodeIdx> = self.store.iter().map(|(idx, _)| idx).collect();

        let order = self.topo_order(&working);
        for idx in order {
            self.try_promote(idx);
        }

        debug!(nodes = working.len(), "compute-all pass starting");
        self.dispatch(&working, opts)
    }

    /// The targets plus every ancestor that still needs recomputation.
    /// Traversal stops below current nodes: their subtrees are satisfied.
    fn stale_ancestor_closure(&self, targets: &[NodeIdx]) -> HashSet<NodeIdx> {
        let mut closure = HashSet::new();
        let mut stack: Vec<NodeIdx> = targets
            .iter()
            .copied()
            .filter(|&idx| !self.store.node(idx).state.is_current())
            .collect();

        while let Some(idx) = stack.pop() {
            if !closure.insert(idx) {
                continue;
            }
            for pred in self.store.node(idx).predecessors.iter().copied() {
                if !self.store.node(pred).state.is_current() && !closure.contains(&pred) {
                    stack.push(pred);
                }
            }
        }
        closure
    }

    /// Fail fast on ancestors that can never produce a value.
    fn validate_closure(
        &self,
        working: &HashSet<NodeIdx>,
        targets: &[NodeIdx],
    ) -> Result<(), GraphError> {
        for &idx in working {
            let node = self.store.node(idx);
            let dead_end = match node.state {
                NodeState::Placeholder => true,
                NodeState::Uninitialized => node.predecessors.is_empty() && !node.has_function(),
                _ => false,
            };
            if dead_end {
                return Err(GraphError::MissingInput {
                    target: self.blamed_target(idx, working, targets),
                    node: node.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// The name of a target whose ancestry contains `ancestor`: walk
    /// successor edges within the working set until a target is reached.
    fn blamed_target(
        &self,
        ancestor: NodeIdx,
        working: &HashSet<NodeIdx>,
        targets: &[NodeIdx],
    ) -> String {
        let mut seen = HashSet::new();
        let mut stack = vec![ancestor];
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            if targets.contains(&idx) {
                return self.store.node(idx).name.clone();
            }
            stack.extend(
                self.store
                    .node(idx)
                    .successors
                    .iter()
                    .copied()
                    .filter(|succ| working.contains(succ)),
            );
        }
        targets
            .first()
            .map(|&t| self.store.node(t).name.clone())
            .unwrap_or_default()
    }

    /// Kahn's algorithm restricted to `set`. Nodes on a cycle never reach
    /// in-degree zero and are simply absent from the result.
    fn topo_order(&self, set: &HashSet<NodeIdx>) -> Vec<NodeIdx> {
        let mut in_degree: HashMap<NodeIdx, usize> = HashMap::new();
        let mut queue = VecDeque::new();
        let mut order = Vec::with_capacity(set.len());

        for &idx in set {
            let degree = self
                .store
                .node(idx)
                .predecessors
                .iter()
                .filter(|pred| set.contains(pred))
                .count();
            in_degree.insert(idx, degree);
            if degree == 0 {
                queue.push_back(idx);
            }
        }

        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for succ in self.store.node(idx).successors.iter().copied() {
                if let Some(degree) = in_degree.get_mut(&succ) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(succ);
                    }
                }
            }
        }
        order
    }

    /// The first-completion-driven scheduler shared by `compute` and
    /// `compute_all`.
    fn dispatch(&mut self, working: &HashSet<NodeIdx>, opts: ComputeOpts) -> Result<(), GraphError> {
        let (tx, rx) = crossbeam_channel::unbounded::<Completion<T>>();
        let mut in_flight: HashSet<NodeIdx> = HashSet::new();
        let mut completed: HashSet<NodeIdx> = HashSet::new();

        let ready: Vec<NodeIdx> = working
            .iter()
            .copied()
            .filter(|&idx| self.store.node(idx).state == NodeState::Computable)
            .collect();
        for idx in ready {
            self.submit(idx, &tx, &mut in_flight)?;
        }

        while !in_flight.is_empty() {
            // First-completion wait; arrival order, not topological order.
            let done = rx
                .recv()
                .expect("completion channel stays open while tasks are in flight");
            in_flight.remove(&done.idx);

            if !completed.insert(done.idx) {
                return Err(GraphError::CycleDetected {
                    node: self.store.node(done.idx).name.clone(),
                });
            }

            match done.outcome {
                Ok(value) => {
                    {
                        let node = self.store.node_mut(done.idx);
                        node.payload = NodePayload::Computed(value);
                        node.timing = Some(Timing {
                            start: done.started,
                            end: done.finished,
                            duration: done.duration,
                        });
                    }
                    self.store.set_state(done.idx, NodeState::UpToDate);
                    trace!(node = %self.store.node(done.idx).name, "node computed");

                    let descendants = self.store.descendants([done.idx]);
                    self.mark_stale(descendants.into_iter().filter(|&d| d != done.idx));

                    let successors: Vec<NodeIdx> = self
                        .store
                        .node(done.idx)
                        .successors
                        .iter()
                        .copied()
                        .collect();
                    for succ in successors {
                        self.try_promote(succ);
                        if self.store.node(succ).state == NodeState::Computable
                            && working.contains(&succ)
                            && !in_flight.contains(&succ)
                        {
                            self.submit(succ, &tx, &mut in_flight)?;
                        }
                    }
                }
                Err(record) => {
                    let name = self.store.node(done.idx).name.clone();
                    warn!(node = %name, cause = %record.cause, "node computation failed");

                    self.store.node_mut(done.idx).payload = NodePayload::Failed(record.clone());
                    self.store.set_state(done.idx, NodeState::Error);

                    let descendants = self.store.descendants([done.idx]);
                    self.mark_stale(descendants.into_iter().filter(|&d| d != done.idx));

                    if opts.raise_exceptions {
                        // Outstanding workers finish into a closed channel.
                        return Err(GraphError::NodeFailed { node: name, record });
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve a computable node's executor and arguments and enqueue its
    /// function. Argument values are cloned here, on the dispatch thread;
    /// workers never touch the store.
    fn submit(
        &self,
        idx: NodeIdx,
        tx: &Sender<Completion<T>>,
        in_flight: &mut HashSet<NodeIdx>,
    ) -> Result<(), GraphError> {
        let node = self.store.node(idx);
        let name = node.name.clone();

        let executor = self
            .executors
            .resolve(node.executor.as_deref())
            .cloned()
            .ok_or_else(|| GraphError::UnknownExecutor {
                node: name.clone(),
                executor: node.executor.clone().unwrap_or_default(),
            })?;

        let func = node
            .func
            .clone()
            .expect("computable node has a function");

        let mut positional = Vec::with_capacity(node.positional.len());
        for slot in &node.positional {
            positional.push(self.resolve_slot(idx, slot)?);
        }
        let mut keyword = IndexMap::with_capacity(node.keyword.len());
        for (param, slot) in &node.keyword {
            keyword.insert(param.clone(), self.resolve_slot(idx, slot)?);
        }
        let args = CallArgs::new(positional, keyword);

        let tx = tx.clone();
        executor.execute(Box::new(move || {
            let started = SystemTime::now();
            let clock = Instant::now();
            let outcome = match catch_unwind(AssertUnwindSafe(|| func.call(args))) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(ErrorRecord::from_error(err.as_ref())),
                Err(panic) => Err(ErrorRecord::from_panic(panic.as_ref())),
            };
            let duration = clock.elapsed();
            // The pass may already be over (raise_exceptions); a closed
            // channel just drops the result.
            let _ = tx.send(Completion {
                idx,
                started,
                finished: SystemTime::now(),
                duration,
                outcome,
            });
        }));

        in_flight.insert(idx);
        trace!(node = %name, "submitted to executor");
        Ok(())
    }

    fn resolve_slot(&self, succ: NodeIdx, slot: &InputSlot<T>) -> Result<T, GraphError> {
        match slot {
            InputSlot::Constant(value) => Ok(value.clone()),
            InputSlot::Node(pred) => {
                let pred_node = self.store.node(*pred);
                pred_node
                    .payload
                    .value()
                    .cloned()
                    .ok_or_else(|| GraphError::MissingInput {
                        target: self.store.node(succ).name.clone(),
                        node: pred_node.name.clone(),
                    })
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
