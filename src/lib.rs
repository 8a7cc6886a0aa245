mod builder;
mod completion;
mod error;
mod inner;
mod worker;


pub use builder::BatchPoolBuilder;
pub use completion::CompletionHandle;
pub use error::{FailureRecord, PoolError};
pub use worker::strategy::{QueueKind, ThreadResource};

use atomic_enum::atomic_enum;
use inner::PoolInner;
use std::{num::NonZeroUsize, sync::Arc, thread};

/// Pool of persistent threads that repeatedly process a batch of tasks
pub struct BatchPool(PoolInner);

impl BatchPool {
    /// Batch pool builder
    pub fn builder() -> BatchPoolBuilder {
        BatchPoolBuilder::default()
    }

    /// Add a task to the buffered workload.
    ///
    /// Fails while a workload is in flight or after the pool was terminated.
    pub fn append(&self, task: Task) -> Result<(), PoolError> {
        self.0.append(task)
    }

    /// Replace the buffered workload and start processing it
    pub fn submit(&self, workload: Vec<Task>) -> Option<CompletionHandle> {
        self.0.submit(workload)
    }

    /// Same as [`BatchPool::submit`], cloning the tasks out of `workload`
    pub fn submit_cloned(&self, workload: &[Task]) -> Option<CompletionHandle> {
        self.0.submit(workload.to_vec())
    }

    /// Start processing the buffered workload.
    ///
    /// Returns `None` if the pool is not ready or there is nothing to run.
    pub fn trigger(&self) -> Option<CompletionHandle> {
        self.0.trigger()
    }

    /// Current lifecycle status
    pub fn status(&self) -> Status {
        self.0.status()
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.0.size()
    }

    /// Number of tasks currently buffered
    pub fn pending(&self) -> usize {
        self.0.pending()
    }

    /// Failures captured during the most recent dispatch
    pub fn task_errors(&self) -> Vec<FailureRecord> {
        self.0.task_errors()
    }

    /// Stop the pool. Workers exit as soon as they finish their current task.
    pub fn terminate(&self) {
        self.0.terminate()
    }

    /// Terminate the pool and wait for every worker thread to exit
    pub fn join(self) -> thread::Result<()> {
        self.0.join()
    }

    pub(crate) fn new(config: PoolConfig) -> Result<Self, PoolError> {
        PoolInner::new(config).map(Self)
    }
}

/// Unit of work. Tasks are shared so that a workload can be run again.
pub type Task = Arc<dyn Fn() + Send + Sync>;

/// Wrap a closure into a [`Task`]
pub fn task(f: impl Fn() + Send + Sync + 'static) -> Task {
    Arc::new(f)
}

/// Lifecycle of the pool
#[atomic_enum]
#[derive(PartialEq, Eq)]
pub enum Status {
    /// Accepting new work
    Ready,
    /// A workload is in flight
    Processing,
    /// A task of the in-flight workload failed
    Error,
    /// The pool is shutting down, no more work is accepted
    Terminating,
}

/// When the workload buffer is purged after a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearMode {
    /// The worker finishing the dispatch clears the buffer before resolving
    #[default]
    Eager,
    /// The buffer is kept and cleared by the next `append` or `trigger`
    Lazy,
}

/// How task failures are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// The panic unwinds out of the worker thread
    None,
    /// The failure is recorded and the pool keeps running
    #[default]
    Ignore,
    /// The failure is recorded and the pool terminates
    Terminate,
}

/// Function that observes captured failures
pub(crate) type FailureHandler = Arc<dyn Fn(&FailureRecord) + Send + Sync>;

pub(crate) struct PoolConfig {
    pub(crate) threads: NonZeroUsize,
    pub(crate) clear_mode: ClearMode,
    pub(crate) error_policy: ErrorPolicy,
    pub(crate) queue: QueueKind,
    pub(crate) failure_handler: Option<FailureHandler>,
    pub(crate) thread_name: String,
}
