//! Executors
//!
//! An [`Executor`] is a fixed pool of worker threads consuming boxed jobs
//! from a channel. The dispatch loop performs no node computation inline: it
//! prepares a job per computable node and hands it to the node's executor,
//! then blocks on the shared completion channel.
//!
//! An [`ExecutorSet`] groups one default executor with any number of named
//! executors, each independently sized. A node stores at most an executor
//! name; resolution happens at submission time.
//!
//! Worker threads never die on a failing node: node-function errors and
//! panics are caught inside the job itself, so a worker just moves on to the
//! next job.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use tracing::debug;

/// A unit of work handed to a worker thread.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// A pool of worker threads.
///
/// Dropping the executor closes the job channel; workers drain what is
/// queued and exit, and the drop blocks until they have joined.
pub struct Executor {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl Executor {
    /// A pool with the given number of worker threads (at least one).
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let workers = (0..threads)
            .map(|index| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("cascade-worker-{index}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                    })
                    .expect("worker thread spawns")
            })
            .collect();

        debug!(threads, "started executor");
        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// A pool sized to the machine's available parallelism.
    pub fn with_default_parallelism() -> Self {
        let threads = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(1);
        Self::new(threads)
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Enqueue a job. Jobs may start in any order across workers.
    pub(crate) fn execute(&self, job: Job) {
        if let Some(sender) = &self.sender {
            // Send only fails once shutdown has begun; the job is then
            // dropped along with the run that queued it.
            let _ = sender.send(job);
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// The executors available to a graph: one default plus named pools.
///
/// Cloning shares the underlying pools; a copied graph computes on the same
/// workers as the original.
#[derive(Clone)]
pub struct ExecutorSet {
    default: Arc<Executor>,
    named: HashMap<String, Arc<Executor>>,
}

impl ExecutorSet {
    pub fn new(default: Executor) -> Self {
        Self {
            default: Arc::new(default),
            named: HashMap::new(),
        }
    }

    /// Register a named executor.
    pub fn with_named(mut self, name: impl Into<String>, executor: Executor) -> Self {
        self.named.insert(name.into(), Arc::new(executor));
        self
    }

    /// The executor a node resolves to: its named executor if set, else the
    /// default. `None` means the name was never registered.
    pub(crate) fn resolve(&self, name: Option<&str>) -> Option<&Arc<Executor>> {
        match name {
            None => Some(&self.default),
            Some(name) => self.named.get(name),
        }
    }
}

impl Default for ExecutorSet {
    fn default() -> Self {
        Self::new(Executor::with_default_parallelism())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
