//! Integration Tests for the Computation Graph
//!
//! These tests exercise definition, invalidation, dispatch, and failure
//! containment together, end to end.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use cascade_core::{
    node_fn1, node_fn2, ComputationGraph, ComputeOpts, Executor, ExecutorSet, GraphError,
    NodeDefinition, NodeState,
};

/// a -> b -> c, with `a` a pure input.
fn add_chain() -> ComputationGraph<i64> {
    let mut graph = ComputationGraph::new();
    graph
        .define_node(NodeDefinition::new("a").initial_value(1))
        .unwrap();
    graph
        .define_node(NodeDefinition::new("b").function(node_fn1("a", |a: i64| Ok(a + 1))))
        .unwrap();
    graph
        .define_node(NodeDefinition::new("c").function(node_fn1("b", |b: i64| Ok(b + 2))))
        .unwrap();
    graph
}

/// Test that computing a target computes its whole stale ancestry.
#[test]
fn chain_computes_through_ancestors() {
    let mut graph = add_chain();
    graph.compute(["c"], ComputeOpts::default()).unwrap();

    assert_eq!(graph.value("c").unwrap(), &4);
    assert_eq!(
        graph.states(["a", "b", "c"]).unwrap(),
        vec![NodeState::UpToDate; 3]
    );
}

/// Test that inserting a new input invalidates descendants and that
/// recomputing picks up the new value.
#[test]
fn insert_invalidates_and_recompute_converges() {
    let mut graph = add_chain();
    graph.compute(["c"], ComputeOpts::default()).unwrap();

    graph.insert("a", 10).unwrap();
    assert_eq!(graph.state("a").unwrap(), NodeState::UpToDate);
    assert_eq!(graph.state("b").unwrap(), NodeState::Computable);
    assert_eq!(graph.state("c").unwrap(), NodeState::Stale);

    graph.compute(["c"], ComputeOpts::default()).unwrap();
    assert_eq!(graph.value("c").unwrap(), &13);
}

/// Test that a node never runs before its predecessors within a pass.
#[test]
fn dispatch_respects_causal_order() {
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut graph: ComputationGraph<i64> = ComputationGraph::new();
    graph
        .define_node(NodeDefinition::new("a").initial_value(0))
        .unwrap();
    for (name, input) in [("b", "a"), ("c", "b"), ("d", "c")] {
        let order = order.clone();
        let label = name.to_string();
        graph
            .define_node(NodeDefinition::new(name).function(node_fn1(input, move |v: i64| {
                order.lock().unwrap().push(label.clone());
                Ok(v + 1)
            })))
            .unwrap();
    }

    graph.compute(["d"], ComputeOpts::default()).unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["b", "c", "d"]);
    assert_eq!(graph.value("d").unwrap(), &3);
}

/// Test that an up-to-date node is not recomputed on a later pass.
#[test]
fn no_redundant_recomputation() {
    let calls = Arc::new(AtomicI32::new(0));
    let calls_clone = calls.clone();

    let mut graph: ComputationGraph<i64> = ComputationGraph::new();
    graph
        .define_node(NodeDefinition::new("a").initial_value(1))
        .unwrap();
    graph
        .define_node(NodeDefinition::new("b").function(node_fn1("a", move |a: i64| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(a * 2)
        })))
        .unwrap();
    graph
        .define_node(NodeDefinition::new("c").function(node_fn1("b", |b: i64| Ok(b + 1))))
        .unwrap();

    graph.compute(["c"], ComputeOpts::default()).unwrap();
    graph.compute(["c"], ComputeOpts::default()).unwrap();
    graph.compute(["b"], ComputeOpts::default()).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Test that a failing node lands in `Error` with its record, while the
/// compute call itself succeeds.
#[test]
fn failure_is_contained_in_the_node() {
    let mut graph: ComputationGraph<f64> = ComputationGraph::new();
    graph
        .define_node(NodeDefinition::new("denominator").initial_value(0.0))
        .unwrap();
    graph
        .define_node(
            NodeDefinition::new("ratio").function(node_fn1("denominator", |d: f64| {
                if d == 0.0 {
                    Err("division by zero".into())
                } else {
                    Ok(1.0 / d)
                }
            })),
        )
        .unwrap();

    graph.compute(["ratio"], ComputeOpts::default()).unwrap();

    assert_eq!(graph.state("ratio").unwrap(), NodeState::Error);
    match graph.value("ratio").unwrap_err() {
        GraphError::NodeFailed { node, record } => {
            assert_eq!(node, "ratio");
            assert_eq!(record.cause, "division by zero");
        }
        other => panic!("expected NodeFailed, got {other:?}"),
    }

    // Fixing the input clears the failure on the next pass.
    graph.insert("denominator", 4.0).unwrap();
    graph.compute(["ratio"], ComputeOpts::default()).unwrap();
    assert_eq!(graph.value("ratio").unwrap(), &0.25);
}

/// Test that `raise_exceptions` turns a node failure into a compute error.
#[test]
fn raise_exceptions_propagates_the_failure() {
    let mut graph: ComputationGraph<i64> = ComputationGraph::new();
    graph
        .define_node(NodeDefinition::new("a").initial_value(1))
        .unwrap();
    graph
        .define_node(
            NodeDefinition::new("b").function(node_fn1("a", |_: i64| Err("broken".into()))),
        )
        .unwrap();

    let err = graph.compute(["b"], ComputeOpts::raising()).unwrap_err();
    assert!(matches!(err, GraphError::NodeFailed { .. }));
}

/// Test that a failure in one chain leaves an independent chain up to date.
#[test]
fn independent_chains_are_isolated() {
    let mut graph: ComputationGraph<i64> = ComputationGraph::new();
    graph
        .define_node(NodeDefinition::new("x").initial_value(1))
        .unwrap();
    graph
        .define_node(
            NodeDefinition::new("y").function(node_fn1("x", |_: i64| Err("y failed".into()))),
        )
        .unwrap();
    graph
        .define_node(NodeDefinition::new("p").initial_value(10))
        .unwrap();
    graph
        .define_node(NodeDefinition::new("q").function(node_fn1("p", |p: i64| Ok(p * 2))))
        .unwrap();

    graph.compute(["y", "q"], ComputeOpts::default()).unwrap();

    assert_eq!(graph.state("y").unwrap(), NodeState::Error);
    assert_eq!(graph.state("q").unwrap(), NodeState::UpToDate);
    assert_eq!(graph.value("q").unwrap(), &20);
}

/// Test that siblings of a failing node still complete within one pass.
#[test]
fn sibling_branch_survives_failure_in_one_pass() {
    let mut graph: ComputationGraph<i64> = ComputationGraph::new();
    graph
        .define_node(NodeDefinition::new("a").initial_value(1))
        .unwrap();
    graph
        .define_node(
            NodeDefinition::new("bad").function(node_fn1("a", |_: i64| Err("nope".into()))),
        )
        .unwrap();
    graph
        .define_node(NodeDefinition::new("good").function(node_fn1("a", |a: i64| Ok(a + 99))))
        .unwrap();
    graph
        .define_node(
            NodeDefinition::new("join")
                .function(node_fn2("bad", "good", |b: i64, g: i64| Ok(b + g))),
        )
        .unwrap();

    graph.compute(["join"], ComputeOpts::default()).unwrap();

    assert_eq!(graph.state("bad").unwrap(), NodeState::Error);
    assert_eq!(graph.value("good").unwrap(), &100);
    // The join is blocked behind the failed branch.
    assert_eq!(graph.state("join").unwrap(), NodeState::Stale);
}

/// Test the pin lifecycle: a pinned node shields itself from cascades,
/// serves its frozen value, and rejoins propagation on unpin.
#[test]
fn pin_freezes_and_unpin_releases() {
    let mut graph = add_chain();
    graph.compute(["c"], ComputeOpts::default()).unwrap();

    graph.pin_value("b", 50).unwrap();
    graph.insert("a", 100).unwrap();
    assert_eq!(graph.state("b").unwrap(), NodeState::Pinned);

    graph.compute(["c"], ComputeOpts::default()).unwrap();
    assert_eq!(graph.value("c").unwrap(), &52);

    graph.unpin("b").unwrap();
    graph.compute(["c"], ComputeOpts::default()).unwrap();
    assert_eq!(graph.value("b").unwrap(), &101);
    assert_eq!(graph.value("c").unwrap(), &103);
}

/// Test that nodes route to their named executor and compute there.
#[test]
fn named_executors_route_work() {
    let set = ExecutorSet::new(Executor::new(2)).with_named("slow", Executor::new(1));
    let mut graph: ComputationGraph<i64> = ComputationGraph::with_executors(set);

    graph
        .define_node(NodeDefinition::new("a").initial_value(3))
        .unwrap();
    graph
        .define_node(
            NodeDefinition::new("b")
                .function(node_fn1("a", |a: i64| Ok(a * a)))
                .executor("slow"),
        )
        .unwrap();
    graph
        .define_node(NodeDefinition::new("c").function(node_fn1("b", |b: i64| Ok(b + 1))))
        .unwrap();

    graph.compute(["c"], ComputeOpts::default()).unwrap();
    assert_eq!(graph.value("c").unwrap(), &10);
    assert_eq!(graph.executor_name("b").unwrap(), Some("slow"));
}

/// Test that a wide fan-out computes fully under concurrent dispatch.
#[test]
fn fan_out_fan_in_converges() {
    let mut graph: ComputationGraph<i64> = ComputationGraph::new();
    graph
        .define_node(NodeDefinition::new("seed").initial_value(1))
        .unwrap();

    let mut layer = Vec::new();
    for i in 0..16i64 {
        let name = format!("leaf{i}");
        graph
            .define_node(
                NodeDefinition::new(&name)
                    .function(node_fn1("seed", move |s: i64| Ok(s + i))),
            )
            .unwrap();
        layer.push(name);
    }

    graph.compute(layer.iter(), ComputeOpts::default()).unwrap();

    let total: i64 = graph
        .values(layer.iter())
        .unwrap()
        .into_iter()
        .copied()
        .sum();
    // sum of (1 + i) for i in 0..16
    assert_eq!(total, 16 + (0..16).sum::<i64>());
}

/// Test that redefining a mid-chain node rewires and invalidates correctly.
#[test]
fn redefinition_rewires_and_invalidates() {
    let mut graph = add_chain();
    graph.compute(["c"], ComputeOpts::default()).unwrap();

    graph
        .define_node(NodeDefinition::new("b").function(node_fn1("a", |a: i64| Ok(a * 100))))
        .unwrap();
    assert_eq!(graph.state("c").unwrap(), NodeState::Stale);

    graph.compute(["c"], ComputeOpts::default()).unwrap();
    assert_eq!(graph.value("c").unwrap(), &102);
}

/// Test that a copied graph computes independently of the original.
#[test]
fn copied_graph_is_independent() {
    let mut graph = add_chain();
    graph.compute(["c"], ComputeOpts::default()).unwrap();

    let mut copied = graph.copy();
    copied.insert("a", 1000).unwrap();
    copied.compute(["c"], ComputeOpts::default()).unwrap();

    assert_eq!(copied.value("c").unwrap(), &1003);
    assert_eq!(graph.value("c").unwrap(), &4);
    assert_eq!(graph.state("c").unwrap(), NodeState::UpToDate);
}
