//! Execution
//!
//! Everything that turns computable nodes into values: thread-pool executors
//! and the first-completion dispatch loop. The graph module decides *what*
//! is computable; this module decides *where* and *when* it runs.

mod executor;
mod scheduler;

pub use executor::{Executor, ExecutorSet};
pub use scheduler::ComputeOpts;
