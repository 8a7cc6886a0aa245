use crate::{BatchPool, ClearMode, ErrorPolicy, FailureRecord, PoolConfig, PoolError, QueueKind};
use std::{num::NonZeroUsize, sync::Arc};

#[derive(Default)]
pub struct BatchPoolBuilder {
    threads: Option<NonZeroUsize>,
    clear_mode: ClearMode,
    error_policy: ErrorPolicy,
    queue: QueueKind,
    failure_handler: Option<crate::FailureHandler>,
    thread_name: Option<String>,
}

impl BatchPoolBuilder {
    /// Number of persistent worker threads
    pub fn threads(mut self, val: NonZeroUsize) -> Self {
        self.threads = Some(val);
        self
    }

    /// When the workload buffer gets cleared
    pub fn clear_mode(mut self, val: ClearMode) -> Self {
        self.clear_mode = val;
        self
    }

    /// What happens when a task panics
    pub fn error_policy(mut self, val: ErrorPolicy) -> Self {
        self.error_policy = val;
        self
    }

    /// How tasks are distributed among workers
    pub fn queue(mut self, val: QueueKind) -> Self {
        self.queue = val;
        self
    }

    /// Callback for every captured task failure
    pub fn failure_handler(mut self, f: impl Fn(&FailureRecord) + Send + Sync + 'static) -> Self {
        self.failure_handler = Some(Arc::new(f));
        self
    }

    /// Prefix for worker thread names
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = Some(prefix.into());
        self
    }

    pub fn build(self) -> Result<BatchPool, PoolError> {
        BatchPool::new(PoolConfig {
            threads: self.threads.unwrap_or_else(default_thread_count),
            clear_mode: self.clear_mode,
            error_policy: self.error_policy,
            queue: self.queue,
            failure_handler: self.failure_handler,
            thread_name: self
                .thread_name
                .unwrap_or_else(|| String::from("batch-worker")),
        })
    }
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}
