//! Error Types
//!
//! This module defines the error taxonomy of the engine:
//!
//! - [`GraphError`]: errors raised to the caller of a graph operation
//!   (malformed definitions, unknown names, uncomputable targets, cycles).
//! - [`ErrorRecord`]: the captured failure of a single node function. It is
//!   stored as the node's payload when the node enters the `Error` state, so
//!   a failed branch never aborts unrelated branches.
//!
//! Node functions themselves return [`NodeError`], a boxed error, which the
//! dispatch loop converts into an [`ErrorRecord`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::NodeState;

/// The error type node functions may return.
pub type NodeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by graph operations.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// A node definition is malformed (bad binding, unknown parameter, ...).
    #[error("invalid definition for node `{node}`: {reason}")]
    Configuration { node: String, reason: String },

    /// A target cannot be computed because a required ancestor has no value
    /// and no way to produce one.
    #[error("cannot compute `{target}`: node `{node}` has no value and no function")]
    MissingInput { target: String, node: String },

    /// A node completed twice within a single dispatch pass, which can only
    /// happen if the graph contains a cycle through it.
    #[error("cycle detected: node `{node}` was computed twice in one pass")]
    CycleDetected { node: String },

    /// An operation referenced a name that is not in the graph.
    #[error("node `{0}` does not exist")]
    NonExistentNode(String),

    /// A node function failed while `raise_exceptions` was requested.
    #[error("node `{node}` failed: {record}")]
    NodeFailed { node: String, record: ErrorRecord },

    /// `value` was read from a node that holds no computed value.
    #[error("node `{node}` has no value (state is {state:?})")]
    ValueUnavailable { node: String, state: NodeState },

    /// A node names an executor that was never registered.
    #[error("node `{node}` is bound to unknown executor `{executor}`")]
    UnknownExecutor { node: String, executor: String },
}

/// The captured failure of a node function.
///
/// `cause` is the display form of the error (or panic payload); `trace` holds
/// the chain of error sources, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub cause: String,
    pub trace: Vec<String>,
}

impl ErrorRecord {
    /// Build a record from a node function's error, walking its source chain.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut trace = Vec::new();
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
        while let Some(e) = current {
            trace.push(e.to_string());
            current = e.source();
        }
        Self {
            cause: err.to_string(),
            trace,
        }
    }

    /// Build a record from a panic payload caught inside a worker.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let cause = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "node function panicked".to_string()
        };
        Self {
            trace: vec![format!("panic: {cause}")],
            cause,
        }
    }
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cause)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        inner: Inner,
    }

    #[derive(Debug, Error)]
    #[error("inner failure")]
    struct Inner;

    #[test]
    fn record_walks_source_chain() {
        let err = Outer { inner: Inner };
        let record = ErrorRecord::from_error(&err);

        assert_eq!(record.cause, "outer failure");
        assert_eq!(record.trace, vec!["outer failure", "inner failure"]);
    }

    #[test]
    fn record_from_str_panic() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let record = ErrorRecord::from_panic(payload.as_ref());

        assert_eq!(record.cause, "boom");
        assert_eq!(record.trace, vec!["panic: boom"]);
    }

    #[test]
    fn record_from_string_panic() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("divide by zero".to_string());
        let record = ErrorRecord::from_panic(payload.as_ref());

        assert_eq!(record.cause, "divide by zero");
    }

    #[test]
    fn graph_error_messages_name_the_node() {
        let err = GraphError::NonExistentNode("x".to_string());
        assert_eq!(err.to_string(), "node `x` does not exist");

        let err = GraphError::CycleDetected {
            node: "loop".to_string(),
        };
        assert!(err.to_string().contains("`loop`"));
    }
}
