//! Computation Graph
//!
//! The public graph object. A [`ComputationGraph`] owns the node store and
//! the executor set; callers define nodes against it, insert input values,
//! and ask for targets to be computed.
//!
//! # Defining nodes
//!
//! Nodes are described by a [`NodeDefinition`] builder and committed with
//! [`ComputationGraph::define_node`]:
//!
//! ```rust,ignore
//! graph.define_node(NodeDefinition::new("c")
//!     .function(node_fn2("a", "b", |a: i64, b: i64| Ok(a + b))))?;
//! ```
//!
//! Inputs may be wired three ways: positionally (`.arg`), by keyword
//! (`.kwarg`), or inferred from the function's declared parameter names when
//! `infer_parameters` is left on. Referenced nodes that do not exist yet are
//! created as placeholders; a parameter with a declared default and no
//! matching node is simply left unbound.
//!
//! Redefining a name replaces the old definition: its predecessor edges are
//! dropped (orphaned placeholders pruned), its successors keep their wiring.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::error::GraphError;
use crate::exec::ExecutorSet;
use crate::func::NodeFunc;

use super::node::{InputSlot, NodeIdx, NodePayload, NodeState, ParameterBinding, Timing};
use super::store::NodeStore;

/// One declared input of a node under definition: an inline constant or a
/// reference to another node by name.
#[derive(Debug, Clone)]
pub enum Input<T> {
    Value(T),
    Node(String),
}

impl<T> Input<T> {
    pub fn value(value: T) -> Self {
        Input::Value(value)
    }

    pub fn node(name: impl Into<String>) -> Self {
        Input::Node(name.into())
    }
}

/// Builder for a node definition.
pub struct NodeDefinition<T> {
    name: String,
    func: Option<Arc<dyn NodeFunc<T>>>,
    positional: Vec<Input<T>>,
    keyword: Vec<(String, Input<T>)>,
    initial_value: Option<T>,
    tags: Vec<String>,
    group: Option<String>,
    executor: Option<String>,
    infer_parameters: bool,
}

impl<T> NodeDefinition<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            func: None,
            positional: Vec::new(),
            keyword: Vec::new(),
            initial_value: None,
            tags: Vec::new(),
            group: None,
            executor: None,
            infer_parameters: true,
        }
    }

    /// Bind a function to the node.
    pub fn function(mut self, func: impl NodeFunc<T> + 'static) -> Self {
        self.func = Some(Arc::new(func));
        self
    }

    /// Bind an already-shared function to the node.
    pub fn function_arc(mut self, func: Arc<dyn NodeFunc<T>>) -> Self {
        self.func = Some(func);
        self
    }

    /// Append one positional input.
    pub fn arg(mut self, input: Input<T>) -> Self {
        self.positional.push(input);
        self
    }

    /// Append several positional inputs.
    pub fn args(mut self, inputs: impl IntoIterator<Item = Input<T>>) -> Self {
        self.positional.extend(inputs);
        self
    }

    /// Bind a keyword input by parameter name.
    pub fn kwarg(mut self, name: impl Into<String>, input: Input<T>) -> Self {
        self.keyword.push((name.into(), input));
        self
    }

    /// Seed the node with a value, as if inserted right after definition.
    pub fn initial_value(mut self, value: T) -> Self {
        self.initial_value = Some(value);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Route this node's function to a named executor.
    pub fn executor(mut self, name: impl Into<String>) -> Self {
        self.executor = Some(name.into());
        self
    }

    /// Enable or disable binding unmatched parameters to like-named nodes.
    pub fn infer_parameters(mut self, infer: bool) -> Self {
        self.infer_parameters = infer;
        self
    }
}

/// A mutable directed graph of named nodes, some holding externally supplied
/// values and some derived by functions of their predecessors.
pub struct ComputationGraph<T> {
    pub(crate) store: NodeStore<T>,
    pub(crate) executors: ExecutorSet,
}

impl<T> ComputationGraph<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A graph backed by a default executor sized to the machine.
    pub fn new() -> Self {
        Self::with_executors(ExecutorSet::default())
    }

    /// A graph backed by the given executor set.
    pub fn with_executors(executors: ExecutorSet) -> Self {
        Self {
            store: NodeStore::new(),
            executors,
        }
    }

    /// Define (or redefine) a node. See the module docs for wiring rules.
    pub fn define_node(&mut self, def: NodeDefinition<T>) -> Result<(), GraphError> {
        let NodeDefinition {
            name,
            func,
            positional,
            keyword,
            initial_value,
            tags,
            group,
            executor,
            infer_parameters,
        } = def;

        Self::validate_definition(&name, func.as_deref(), &positional, &keyword)?;

        let idx = self.store.ensure(&name);
        let old_preds = self.store.drop_predecessor_edges(idx);

        let mut positional_slots: SmallVec<[InputSlot<T>; 4]> = SmallVec::new();
        for input in positional {
            positional_slots.push(self.resolve_input(idx, input));
        }

        let mut keyword_slots: IndexMap<String, InputSlot<T>> = IndexMap::new();
        for (param, input) in keyword {
            let slot = self.resolve_input(idx, input);
            keyword_slots.insert(param, slot);
        }

        if infer_parameters {
            if let Some(f) = &func {
                let signature = f.signature().clone();
                for (position, param) in signature.names().iter().enumerate() {
                    if position < positional_slots.len() || keyword_slots.contains_key(param) {
                        continue;
                    }
                    if let Some(pred) = self.store.idx_of(param) {
                        self.store.add_edge(pred, idx);
                        keyword_slots.insert(param.clone(), InputSlot::Node(pred));
                    } else if !signature.defaulted_names().contains(param) {
                        let pred = self.store.ensure(param);
                        self.store.add_edge(pred, idx);
                        keyword_slots.insert(param.clone(), InputSlot::Node(pred));
                    }
                }
            }
        }

        let had_function = func.is_some();
        {
            let node = self.store.node_mut(idx);
            node.func = func;
            node.positional = positional_slots;
            node.keyword = keyword_slots;
            node.group = group;
            node.executor = executor;
            node.payload = NodePayload::Empty;
            node.timing = None;
        }
        self.store.set_tags(idx, tags.into_iter().collect());
        self.store.set_state(idx, NodeState::Uninitialized);
        self.prune_orphan_placeholders(old_preds);

        if let Some(value) = initial_value {
            self.apply_inserts(vec![(idx, value)]);
        } else if had_function {
            let descendants = self.store.descendants([idx]);
            self.mark_stale(descendants.into_iter().filter(|&d| d != idx));
            self.try_promote(idx);
        }

        debug!(node = %name, "defined node");
        Ok(())
    }

    /// Delete a node. With no successors it is removed outright, along with
    /// any predecessor left behind as an unreferenced placeholder. With
    /// successors it is demoted to a placeholder in place: the value and
    /// definition are dropped but the slot survives, so successor wiring
    /// stays valid. Demotion marks descendants stale (they can no longer be
    /// recomputed until the node is redefined).
    pub fn delete_node(&mut self, name: &str) -> Result<(), GraphError> {
        let idx = self.idx_or_err(name)?;
        let preds = self.store.drop_predecessor_edges(idx);

        if self.store.node(idx).successors.is_empty() {
            self.store.remove(idx);
        } else {
            {
                let node = self.store.node_mut(idx);
                node.func = None;
                node.payload = NodePayload::Empty;
                node.positional.clear();
                node.keyword.clear();
                node.group = None;
                node.executor = None;
                node.timing = None;
            }
            self.store.set_tags(idx, HashSet::new());
            self.store.set_state(idx, NodeState::Placeholder);
            let descendants = self.store.descendants([idx]);
            self.mark_stale(descendants.into_iter().filter(|&d| d != idx));
        }

        self.prune_orphan_placeholders(preds);
        debug!(node = %name, "deleted node");
        Ok(())
    }

    /// Structural clone: same nodes and edges, values cloned with `T::clone`,
    /// functions and executors shared.
    pub fn copy(&self) -> Self {
        Self {
            store: self.store.copy(),
            executors: self.executors.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The computed value of a node.
    ///
    /// A failed node surfaces its `ErrorRecord` as `GraphError::NodeFailed`;
    /// a node with no value yet is `GraphError::ValueUnavailable`.
    pub fn value(&self, name: &str) -> Result<&T, GraphError> {
        let idx = self.idx_or_err(name)?;
        let node = self.store.node(idx);
        match &node.payload {
            NodePayload::Computed(value) => Ok(value),
            NodePayload::Failed(record) => Err(GraphError::NodeFailed {
                node: name.to_string(),
                record: record.clone(),
            }),
            NodePayload::Empty => Err(GraphError::ValueUnavailable {
                node: name.to_string(),
                state: node.state,
            }),
        }
    }

    /// Elementwise [`Self::value`].
    pub fn values<I, S>(&self, names: I) -> Result<Vec<&T>, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|n| self.value(n.as_ref())).collect()
    }

    /// The full payload slot of a node: empty, computed, or failed.
    pub fn payload(&self, name: &str) -> Result<&NodePayload<T>, GraphError> {
        Ok(&self.store.node(self.idx_or_err(name)?).payload)
    }

    pub fn state(&self, name: &str) -> Result<NodeState, GraphError> {
        Ok(self.store.node(self.idx_or_err(name)?).state)
    }

    /// Elementwise [`Self::state`].
    pub fn states<I, S>(&self, names: I) -> Result<Vec<NodeState>, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|n| self.state(n.as_ref())).collect()
    }

    pub fn tags(&self, name: &str) -> Result<&HashSet<String>, GraphError> {
        Ok(&self.store.node(self.idx_or_err(name)?).tags)
    }

    /// Elementwise [`Self::tags`].
    pub fn tags_many<I, S>(&self, names: I) -> Result<Vec<&HashSet<String>>, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|n| self.tags(n.as_ref())).collect()
    }

    /// Graph-bound predecessor names in argument order: positional bindings
    /// first, then keyword bindings.
    pub fn inputs(&self, name: &str) -> Result<Vec<&str>, GraphError> {
        let idx = self.idx_or_err(name)?;
        Ok(self
            .store
            .node(idx)
            .bound_inputs()
            .map(|pred| self.store.node(pred).name.as_str())
            .collect())
    }

    /// Elementwise [`Self::inputs`].
    pub fn inputs_many<I, S>(&self, names: I) -> Result<Vec<Vec<&str>>, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|n| self.inputs(n.as_ref())).collect()
    }

    /// Timing of the node's last successful computation, if any.
    pub fn timing(&self, name: &str) -> Result<Option<Timing>, GraphError> {
        Ok(self.store.node(self.idx_or_err(name)?).timing)
    }

    /// Elementwise [`Self::timing`].
    pub fn timings<I, S>(&self, names: I) -> Result<Vec<Option<Timing>>, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|n| self.timing(n.as_ref())).collect()
    }

    pub fn group(&self, name: &str) -> Result<Option<&str>, GraphError> {
        Ok(self.store.node(self.idx_or_err(name)?).group.as_deref())
    }

    pub fn executor_name(&self, name: &str) -> Result<Option<&str>, GraphError> {
        Ok(self
            .store
            .node(self.idx_or_err(name)?)
            .executor
            .as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.store.idx_of(name).is_some()
    }

    /// All node names in definition order.
    pub fn nodes(&self) -> Vec<&str> {
        self.store.iter().map(|(_, node)| node.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Union of the tag index over the given tags, in definition order.
    pub fn nodes_by_tag<I, S>(&self, tags: I) -> Vec<&str>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matched: HashSet<NodeIdx> = tags
            .into_iter()
            .flat_map(|tag| self.store.nodes_with_tag(tag.as_ref()).collect::<Vec<_>>())
            .collect();
        self.store
            .iter()
            .filter(|(idx, _)| matched.contains(idx))
            .map(|(_, node)| node.name.as_str())
            .collect()
    }

    /// Nodes currently in the given state, in definition order.
    pub fn nodes_by_state(&self, state: NodeState) -> Vec<&str> {
        let matched: HashSet<NodeIdx> = self.store.nodes_in_state(state).collect();
        self.store
            .iter()
            .filter(|(idx, _)| matched.contains(idx))
            .map(|(_, node)| node.name.as_str())
            .collect()
    }

    /// Every graph edge as `(predecessor, successor, binding)`. This is the
    /// read-only snapshot consumed by renderers and serializers.
    pub fn edges(&self) -> Vec<(&str, &str, ParameterBinding)> {
        let mut edges = Vec::new();
        for (_, node) in self.store.iter() {
            for (position, slot) in node.positional.iter().enumerate() {
                if let Some(pred) = slot.node() {
                    edges.push((
                        self.store.node(pred).name.as_str(),
                        node.name.as_str(),
                        ParameterBinding::Positional(position),
                    ));
                }
            }
            for (param, slot) in &node.keyword {
                if let Some(pred) = slot.node() {
                    edges.push((
                        self.store.node(pred).name.as_str(),
                        node.name.as_str(),
                        ParameterBinding::Keyword(param.clone()),
                    ));
                }
            }
        }
        edges
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    pub(crate) fn idx_or_err(&self, name: &str) -> Result<NodeIdx, GraphError> {
        self.store
            .idx_of(name)
            .ok_or_else(|| GraphError::NonExistentNode(name.to_string()))
    }

    fn resolve_input(&mut self, succ: NodeIdx, input: Input<T>) -> InputSlot<T> {
        match input {
            Input::Value(value) => InputSlot::Constant(value),
            Input::Node(pred_name) => {
                let pred = self.store.ensure(&pred_name);
                self.store.add_edge(pred, succ);
                InputSlot::Node(pred)
            }
        }
    }

    /// Every fallible check on a definition. This runs before any store
    /// mutation, so a rejected definition leaves the graph untouched.
    fn validate_definition(
        name: &str,
        func: Option<&dyn NodeFunc<T>>,
        positional: &[Input<T>],
        keyword: &[(String, Input<T>)],
    ) -> Result<(), GraphError> {
        let Some(func) = func else {
            if !positional.is_empty() || !keyword.is_empty() {
                return Err(GraphError::Configuration {
                    node: name.to_string(),
                    reason: "inputs declared for a node without a function".to_string(),
                });
            }
            return Ok(());
        };

        let signature = func.signature();
        if positional.len() > signature.names().len() && !signature.has_var_positional() {
            return Err(GraphError::Configuration {
                node: name.to_string(),
                reason: format!(
                    "{} positional inputs for {} declared parameters",
                    positional.len(),
                    signature.names().len()
                ),
            });
        }
        for (index, (param, _)) in keyword.iter().enumerate() {
            if keyword[..index].iter().any(|(earlier, _)| earlier == param) {
                return Err(GraphError::Configuration {
                    node: name.to_string(),
                    reason: format!("keyword input `{param}` bound twice"),
                });
            }
            let position = signature.names().iter().position(|n| n == param);
            match position {
                Some(p) if p < positional.len() => {
                    return Err(GraphError::Configuration {
                        node: name.to_string(),
                        reason: format!("parameter `{param}` bound both positionally and by keyword"),
                    });
                }
                Some(_) => {}
                None if signature.has_var_keyword() => {}
                None => {
                    return Err(GraphError::Configuration {
                        node: name.to_string(),
                        reason: format!("unknown keyword input `{param}`"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Drop predecessors that were left behind as placeholders nothing
    /// references anymore. Placeholders never have predecessors of their
    /// own, so one sweep suffices.
    fn prune_orphan_placeholders(&mut self, preds: Vec<NodeIdx>) {
        let unique: HashSet<NodeIdx> = preds.into_iter().collect();
        for idx in unique {
            if !self.store.is_live(idx) {
                continue;
            }
            let node = self.store.node(idx);
            if node.state == NodeState::Placeholder && node.successors.is_empty() {
                self.store.remove(idx);
            }
        }
    }
}

impl<T> Default for ComputationGraph<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::{node_fn1, node_fn2, ParameterSignature};

    fn add_nodes() -> ComputationGraph<i64> {
        let mut graph = ComputationGraph::new();
        graph
            .define_node(NodeDefinition::new("a").initial_value(2))
            .unwrap();
        graph
            .define_node(NodeDefinition::new("b").initial_value(3))
            .unwrap();
        graph
            .define_node(
                NodeDefinition::new("c").function(node_fn2("a", "b", |a: i64, b: i64| Ok(a + b))),
            )
            .unwrap();
        graph
    }

    #[test]
    fn inference_wires_like_named_nodes() {
        let graph = add_nodes();
        assert_eq!(graph.inputs("c").unwrap(), vec!["a", "b"]);
        assert_eq!(graph.state("c").unwrap(), NodeState::Computable);
    }

    #[test]
    fn inference_creates_placeholders_for_missing_inputs() {
        let mut graph: ComputationGraph<i64> = ComputationGraph::new();
        graph
            .define_node(
                NodeDefinition::new("f").function(node_fn2("x", "y", |x: i64, y: i64| Ok(x * y))),
            )
            .unwrap();

        assert_eq!(graph.state("x").unwrap(), NodeState::Placeholder);
        assert_eq!(graph.state("y").unwrap(), NodeState::Placeholder);
        assert_eq!(graph.state("f").unwrap(), NodeState::Uninitialized);
    }

    #[test]
    fn defaulted_parameters_are_left_unbound() {
        let mut graph: ComputationGraph<i64> = ComputationGraph::new();
        let func = crate::func::FnNode::new(
            ParameterSignature::new(["x", "y"]).with_defaults(["y"]),
            |args: crate::func::CallArgs<i64>| Ok(args.arg(0).copied().unwrap_or(0)),
        );
        graph
            .define_node(NodeDefinition::new("f").function(func))
            .unwrap();

        assert!(graph.contains("x"));
        assert!(!graph.contains("y"));
        assert_eq!(graph.inputs("f").unwrap(), vec!["x"]);
    }

    #[test]
    fn constants_do_not_create_nodes() {
        let mut graph: ComputationGraph<i64> = ComputationGraph::new();
        graph
            .define_node(
                NodeDefinition::new("f")
                    .function(node_fn2("x", "y", |x: i64, y: i64| Ok(x + y)))
                    .arg(Input::value(10))
                    .kwarg("y", Input::node("src")),
            )
            .unwrap();

        assert!(graph.contains("src"));
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.inputs("f").unwrap(), vec!["src"]);
    }

    #[test]
    fn duplicate_keyword_is_rejected_without_rewiring() {
        let mut graph: ComputationGraph<i64> = ComputationGraph::new();
        graph
            .define_node(NodeDefinition::new("src").initial_value(10))
            .unwrap();
        graph
            .define_node(NodeDefinition::new("f").function(node_fn1("src", |s: i64| Ok(s * 2))))
            .unwrap();
        graph.compute(["f"], Default::default()).unwrap();

        let err = graph
            .define_node(
                NodeDefinition::new("f")
                    .function(node_fn2("x", "y", |x: i64, y: i64| Ok(x + y)))
                    .kwarg("y", Input::node("src"))
                    .kwarg("y", Input::value(1)),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::Configuration { .. }));

        // The old definition is fully intact: wiring still reported, and
        // invalidation still flows from src to f.
        assert_eq!(graph.inputs("f").unwrap(), vec!["src"]);
        graph.insert("src", 5).unwrap();
        assert_eq!(graph.state("f").unwrap(), NodeState::Computable);

        graph.compute(["f"], Default::default()).unwrap();
        assert_eq!(graph.value("f").unwrap(), &10);
    }

    #[test]
    fn unknown_keyword_is_a_configuration_error() {
        let mut graph: ComputationGraph<i64> = ComputationGraph::new();
        let err = graph
            .define_node(
                NodeDefinition::new("f")
                    .function(node_fn2("x", "y", |x: i64, y: i64| Ok(x + y)))
                    .kwarg("nope", Input::value(1)),
            )
            .unwrap_err();

        assert!(matches!(err, GraphError::Configuration { .. }));
        assert!(!graph.contains("f"));
    }

    #[test]
    fn inputs_without_function_are_rejected() {
        let mut graph: ComputationGraph<i64> = ComputationGraph::new();
        let err = graph
            .define_node(NodeDefinition::new("f").arg(Input::node("a")))
            .unwrap_err();
        assert!(matches!(err, GraphError::Configuration { .. }));
    }

    #[test]
    fn redefinition_drops_old_edges_and_prunes_placeholders() {
        let mut graph: ComputationGraph<i64> = ComputationGraph::new();
        graph
            .define_node(
                NodeDefinition::new("f").function(node_fn2("x", "y", |x: i64, y: i64| Ok(x + y))),
            )
            .unwrap();
        assert!(graph.contains("x"));
        assert!(graph.contains("y"));

        graph
            .define_node(
                NodeDefinition::new("f").function(node_fn2("p", "q", |p: i64, q: i64| Ok(p - q))),
            )
            .unwrap();

        assert!(!graph.contains("x"));
        assert!(!graph.contains("y"));
        assert_eq!(graph.inputs("f").unwrap(), vec!["p", "q"]);
    }

    #[test]
    fn redefinition_marks_descendants_stale() {
        let mut graph = add_nodes();
        graph.compute(["c"], Default::default()).unwrap();
        assert_eq!(graph.state("c").unwrap(), NodeState::UpToDate);

        graph
            .define_node(NodeDefinition::new("a").initial_value(10))
            .unwrap();
        assert_eq!(graph.state("c").unwrap(), NodeState::Stale);
    }

    #[test]
    fn delete_leaf_removes_orphaned_placeholders() {
        let mut graph: ComputationGraph<i64> = ComputationGraph::new();
        graph
            .define_node(
                NodeDefinition::new("f").function(node_fn2("x", "y", |x: i64, y: i64| Ok(x + y))),
            )
            .unwrap();
        graph.delete_node("f").unwrap();

        assert!(graph.is_empty());
    }

    #[test]
    fn delete_with_successors_demotes_to_placeholder() {
        let mut graph = add_nodes();
        graph.delete_node("a").unwrap();

        assert_eq!(graph.state("a").unwrap(), NodeState::Placeholder);
        assert!(graph.value("a").is_err());
        assert_eq!(graph.inputs("c").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn delete_unknown_node_errors() {
        let mut graph: ComputationGraph<i64> = ComputationGraph::new();
        assert!(matches!(
            graph.delete_node("ghost"),
            Err(GraphError::NonExistentNode(_))
        ));
    }

    #[test]
    fn tag_index_supports_union_queries() {
        let mut graph: ComputationGraph<i64> = ComputationGraph::new();
        graph
            .define_node(NodeDefinition::new("a").initial_value(1).tag("inputs"))
            .unwrap();
        graph
            .define_node(NodeDefinition::new("b").initial_value(2).tag("inputs").tag("serialize"))
            .unwrap();
        graph
            .define_node(NodeDefinition::new("c").initial_value(3).tag("serialize"))
            .unwrap();

        assert_eq!(graph.nodes_by_tag(["inputs"]), vec!["a", "b"]);
        assert_eq!(graph.nodes_by_tag(["inputs", "serialize"]), vec!["a", "b", "c"]);
        assert!(graph.nodes_by_tag(["missing"]).is_empty());
    }

    #[test]
    fn elementwise_metadata_accessors() {
        let mut graph: ComputationGraph<i64> = ComputationGraph::new();
        graph
            .define_node(NodeDefinition::new("a").initial_value(1).tag("input"))
            .unwrap();
        graph
            .define_node(
                NodeDefinition::new("b")
                    .function(node_fn1("a", |a: i64| Ok(a)))
                    .tag("derived"),
            )
            .unwrap();
        graph.compute(["b"], Default::default()).unwrap();

        let tags = graph.tags_many(["a", "b"]).unwrap();
        assert!(tags[0].contains("input"));
        assert!(tags[1].contains("derived"));

        assert_eq!(
            graph.inputs_many(["a", "b"]).unwrap(),
            vec![Vec::<&str>::new(), vec!["a"]]
        );

        let timings = graph.timings(["a", "b"]).unwrap();
        assert!(timings[0].is_none());
        assert!(timings[1].is_some());

        // One unknown name fails the whole query.
        assert!(graph.tags_many(["a", "ghost"]).is_err());
    }

    #[test]
    fn nodes_by_state_tracks_transitions() {
        let mut graph = add_nodes();
        assert_eq!(graph.nodes_by_state(NodeState::UpToDate), vec!["a", "b"]);
        assert_eq!(graph.nodes_by_state(NodeState::Computable), vec!["c"]);

        graph.compute(["c"], Default::default()).unwrap();
        assert_eq!(graph.nodes_by_state(NodeState::UpToDate), vec!["a", "b", "c"]);
        assert!(graph.nodes_by_state(NodeState::Computable).is_empty());
    }

    #[test]
    fn edges_expose_bindings() {
        let graph = add_nodes();
        let edges = graph.edges();
        assert_eq!(edges.len(), 2);
        assert!(edges.contains(&("a", "c", ParameterBinding::Keyword("a".to_string()))));
        assert!(edges.contains(&("b", "c", ParameterBinding::Keyword("b".to_string()))));
    }

    #[test]
    fn copy_is_structural_and_independent() {
        let mut graph = add_nodes();
        graph.compute(["c"], Default::default()).unwrap();

        let copied = graph.copy();
        assert_eq!(copied.value("c").unwrap(), &5);

        graph.insert("a", 100).unwrap();
        assert_eq!(graph.state("c").unwrap(), NodeState::Stale);
        assert_eq!(copied.state("c").unwrap(), NodeState::UpToDate);
    }
}
