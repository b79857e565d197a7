//! Node Functions
//!
//! A derived node carries a function of its predecessors. This module defines
//! the function abstraction the engine calls:
//!
//! - [`ParameterSignature`]: the declared parameters of a function. The engine
//!   never reflects over a closure at runtime; a function states its parameter
//!   names up front, and keyword inference (`infer_parameters`) works purely
//!   off this declaration.
//! - [`CallArgs`]: the resolved positional and keyword arguments for one call,
//!   with constants and predecessor values already substituted in.
//! - [`NodeFunc`]: the trait the dispatch loop invokes on a worker thread.
//! - [`FnNode`] and the `node_fn*` helpers: adapters that turn plain closures
//!   into `NodeFunc` implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! let add = node_fn2("a", "b", |a: i64, b: i64| Ok(a + b));
//! assert_eq!(add.signature().names(), ["a", "b"]);
//! ```

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::NodeError;

/// The declared parameters of a node function.
///
/// This is the introspection surface the wiring layer queries when
/// `infer_parameters` is enabled: parameter names become candidate node
/// bindings, and defaulted parameters may be left unbound.
#[derive(Debug, Clone, Default)]
pub struct ParameterSignature {
    names: Vec<String>,
    defaulted: HashSet<String>,
    var_positional: bool,
    var_keyword: bool,
}

impl ParameterSignature {
    /// A signature with the given ordered parameter names and no defaults.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A signature with no parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Mark parameters as having declared defaults.
    ///
    /// Defaulted parameters with no matching node are left unbound by the
    /// wiring layer instead of being auto-created as placeholders.
    pub fn with_defaults<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defaulted.extend(names.into_iter().map(Into::into));
        self
    }

    /// Accept extra positional arguments beyond the named parameters.
    pub fn with_var_positional(mut self) -> Self {
        self.var_positional = true;
        self
    }

    /// Accept keyword arguments not listed in the named parameters.
    pub fn with_var_keyword(mut self) -> Self {
        self.var_keyword = true;
        self
    }

    /// The ordered parameter names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The parameters that have declared defaults.
    pub fn defaulted_names(&self) -> &HashSet<String> {
        &self.defaulted
    }

    pub fn has_var_positional(&self) -> bool {
        self.var_positional
    }

    pub fn has_var_keyword(&self) -> bool {
        self.var_keyword
    }
}

/// The resolved arguments for one invocation of a node function.
///
/// Positional arguments appear in binding order; keyword arguments keep the
/// order they were bound in. Values are owned clones prepared by the dispatch
/// loop, so a worker thread never touches the node store.
#[derive(Debug, Clone)]
pub struct CallArgs<T> {
    pub positional: Vec<T>,
    pub keyword: IndexMap<String, T>,
}

impl<T> CallArgs<T> {
    pub fn new(positional: Vec<T>, keyword: IndexMap<String, T>) -> Self {
        Self {
            positional,
            keyword,
        }
    }

    /// The positional argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&T> {
        self.positional.get(index)
    }

    /// Flatten the arguments into signature order.
    ///
    /// Parameter `i` resolves to the `i`-th positional argument if one was
    /// supplied, else to the keyword argument of the same name. A parameter
    /// with neither is an error; defaults are the closure's own concern.
    pub fn resolve(&self, signature: &ParameterSignature) -> Result<Vec<T>, NodeError>
    where
        T: Clone,
    {
        let mut resolved = Vec::with_capacity(signature.names().len());
        for (index, name) in signature.names().iter().enumerate() {
            let value = self
                .positional
                .get(index)
                .or_else(|| self.keyword.get(name))
                .ok_or_else(|| format!("missing argument `{name}`"))?;
            resolved.push(value.clone());
        }
        Ok(resolved)
    }
}

/// A function bound to a derived node.
///
/// Implementations must be `Send + Sync`: the dispatch loop hands them to
/// worker threads by `Arc`.
pub trait NodeFunc<T>: Send + Sync {
    /// The declared parameters, used for wiring and argument resolution.
    fn signature(&self) -> &ParameterSignature;

    /// Run the computation against the resolved arguments.
    fn call(&self, args: CallArgs<T>) -> Result<T, NodeError>;
}

/// A `NodeFunc` built from a plain closure over [`CallArgs`].
pub struct FnNode<T> {
    signature: ParameterSignature,
    body: Box<dyn Fn(CallArgs<T>) -> Result<T, NodeError> + Send + Sync>,
}

impl<T> FnNode<T> {
    pub fn new<F>(signature: ParameterSignature, body: F) -> Self
    where
        F: Fn(CallArgs<T>) -> Result<T, NodeError> + Send + Sync + 'static,
    {
        Self {
            signature,
            body: Box::new(body),
        }
    }
}

impl<T> NodeFunc<T> for FnNode<T> {
    fn signature(&self) -> &ParameterSignature {
        &self.signature
    }

    fn call(&self, args: CallArgs<T>) -> Result<T, NodeError> {
        (self.body)(args)
    }
}

/// A zero-argument node function.
pub fn node_fn0<T, F>(body: F) -> FnNode<T>
where
    F: Fn() -> Result<T, NodeError> + Send + Sync + 'static,
{
    FnNode::new(ParameterSignature::empty(), move |_| body())
}

/// A one-argument node function with the given parameter name.
pub fn node_fn1<T, F>(a: &str, body: F) -> FnNode<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) -> Result<T, NodeError> + Send + Sync + 'static,
{
    let signature = ParameterSignature::new([a]);
    let resolver = signature.clone();
    FnNode::new(signature, move |args: CallArgs<T>| {
        let mut resolved = args.resolve(&resolver)?;
        body(resolved.remove(0))
    })
}

/// A two-argument node function with the given parameter names.
pub fn node_fn2<T, F>(a: &str, b: &str, body: F) -> FnNode<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T, T) -> Result<T, NodeError> + Send + Sync + 'static,
{
    let signature = ParameterSignature::new([a, b]);
    let resolver = signature.clone();
    FnNode::new(signature, move |args: CallArgs<T>| {
        let mut resolved = args.resolve(&resolver)?;
        let second = resolved.remove(1);
        body(resolved.remove(0), second)
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
