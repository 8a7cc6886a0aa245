use crate::{
    completion::{self, CompletionHandle, Outcome},
    worker::{
        handle::WorkerHandle,
        strategy::{PartitionedQueue, QueueKind, ResourceScopedQueue, SharedQueue},
        Worker,
    },
    AtomicStatus, ClearMode, ErrorPolicy, FailureHandler, FailureRecord, PoolConfig, PoolError,
    Status, Task,
};
use crossbeam::channel::Sender;
use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};
use std::{
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

pub(crate) struct PoolInner {
    shared: Arc<Shared>,
    workers: Vec<WorkerHandle>,
}

impl PoolInner {
    pub(crate) fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let thread_count = config.threads.get();
        let shared = Arc::new(Shared::new(&config));

        let mut inner = PoolInner {
            shared,
            workers: Vec::with_capacity(thread_count),
        };

        // On a spawn failure `inner` is dropped, which stops the workers started so far
        for id in 0..thread_count {
            let name = format!("{}-{id}", config.thread_name);
            let shared = Arc::clone(&inner.shared);

            let handle = match &config.queue {
                QueueKind::Shared => Worker::new(id, shared, SharedQueue::default()).run(name),
                QueueKind::Partitioned => {
                    Worker::new(id, shared, PartitionedQueue::default()).run(name)
                }
                QueueKind::ResourceScoped(resource) => {
                    Worker::new(id, shared, ResourceScopedQueue::new(Arc::clone(resource)))
                        .run(name)
                }
            }?;

            inner.workers.push(handle);
        }

        Ok(inner)
    }

    pub(crate) fn append(&self, task: Task) -> Result<(), PoolError> {
        let mut state = self.shared.state.lock();

        let status = self.shared.status();
        if status != Status::Ready {
            return Err(PoolError::InvalidState { status });
        }

        if self.shared.clear_mode == ClearMode::Lazy && state.dirty {
            state.clear_workload();
        }

        Arc::make_mut(&mut state.workload).push(task);
        Ok(())
    }

    pub(crate) fn submit(&self, workload: Vec<Task>) -> Option<CompletionHandle> {
        let mut state = self.shared.state.lock();

        if self.shared.status() != Status::Ready {
            return None;
        }

        state.workload = Arc::new(workload);
        state.dirty = false;

        self.dispatch(&mut state)
    }

    pub(crate) fn trigger(&self) -> Option<CompletionHandle> {
        let mut state = self.shared.state.lock();
        self.dispatch(&mut state)
    }

    pub(crate) fn status(&self) -> Status {
        self.shared.status()
    }

    pub(crate) fn size(&self) -> usize {
        self.shared.size
    }

    pub(crate) fn pending(&self) -> usize {
        self.shared.state.lock().workload.len()
    }

    pub(crate) fn task_errors(&self) -> Vec<FailureRecord> {
        self.shared.errors.lock().clone()
    }

    pub(crate) fn terminate(&self) {
        self.shared.terminate()
    }

    /// Wait for all workers to exit, reporting the first one that panicked
    pub(crate) fn join(mut self) -> thread::Result<()> {
        self.shared.terminate();

        let mut result = Ok(());
        for wh in mem::take(&mut self.workers) {
            if let Err(err) = wh.join() {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }

        result
    }

    /// Arm every worker for the buffered workload and wake them up
    fn dispatch(&self, state: &mut DispatchState) -> Option<CompletionHandle> {
        let shared = &self.shared;

        if shared.clear_mode == ClearMode::Lazy
            && shared.status() == Status::Ready
            && state.dirty
        {
            // Never silently re-run a workload that was already consumed
            state.clear_workload();
        }

        if shared.status() != Status::Ready || state.workload.is_empty() {
            return None;
        }

        let (tx, handle) = completion::pair();
        state.completion = Some(tx);
        state.dirty = true;

        shared.errors.lock().clear();
        shared.active.store(shared.size, Ordering::Release);
        shared.cursor.store(0, Ordering::Release);
        shared.status.store(Status::Processing, Ordering::Release);

        state.armed.iter_mut().for_each(|armed| *armed = true);
        shared.wake.notify_all();

        debug!(
            "dispatched {} tasks to {} workers",
            state.workload.len(),
            shared.size
        );

        Some(handle)
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.shared.terminate();

        for wh in mem::take(&mut self.workers) {
            let id = wh.id();
            if wh.join().is_err() {
                error!("batch worker {id} terminated by a panic");
            }
        }
    }
}

/// State shared between the pool and its workers
pub(crate) struct Shared {
    pub(crate) status: AtomicStatus,
    pub(crate) state: Mutex<DispatchState>,
    pub(crate) wake: Condvar,
    /// Workers that haven't finished their share of the current dispatch
    pub(crate) active: AtomicUsize,
    /// Next task index for the shared queue
    pub(crate) cursor: AtomicUsize,
    pub(crate) errors: Mutex<Vec<FailureRecord>>,
    pub(crate) size: usize,
    pub(crate) clear_mode: ClearMode,
    pub(crate) error_policy: ErrorPolicy,
    failure_handler: Option<FailureHandler>,
}

/// Everything guarded by the dispatch lock
pub(crate) struct DispatchState {
    pub(crate) workload: Arc<Vec<Task>>,
    pub(crate) dirty: bool,
    pub(crate) armed: Vec<bool>,
    completion: Option<Sender<Outcome>>,
}

impl DispatchState {
    fn clear_workload(&mut self) {
        self.dirty = false;
        self.workload = Arc::default();
    }
}

impl Shared {
    fn new(config: &PoolConfig) -> Self {
        let size = config.threads.get();

        Self {
            status: AtomicStatus::new(Status::Ready),
            state: Mutex::new(DispatchState {
                workload: Arc::default(),
                dirty: false,
                armed: vec![false; size],
                completion: None,
            }),
            wake: Condvar::new(),
            active: AtomicUsize::new(0),
            cursor: AtomicUsize::new(0),
            errors: Mutex::new(Vec::new()),
            size,
            clear_mode: config.clear_mode,
            error_policy: config.error_policy,
            failure_handler: config.failure_handler.clone(),
        }
    }

    pub(crate) fn status(&self) -> Status {
        self.status.load(Ordering::Acquire)
    }

    /// Whether workers may keep claiming tasks of the current dispatch
    pub(crate) fn can_claim(&self) -> bool {
        matches!(self.status(), Status::Processing | Status::Error)
    }

    pub(crate) fn terminate(&self) {
        let _state = self.state.lock();
        self.status.store(Status::Terminating, Ordering::Release);
        self.wake.notify_all();
    }

    /// Log a captured failure, keep it for the caller and apply the error policy
    pub(crate) fn record_failure(&self, record: FailureRecord) {
        warn!("A batch task generated a panic: {record}");

        if let Some(handler) = &self.failure_handler {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(&record))).is_err() {
                error!("failure handler panicked on: {record}");
            }
        }

        self.errors.lock().push(record);

        match self.error_policy {
            ErrorPolicy::Terminate => self.terminate(),
            _ => {
                let _ = self.status.compare_exchange(
                    Status::Processing,
                    Status::Error,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }
        }
    }

    /// Called by every worker once its share is done. The last one resolves the dispatch.
    pub(crate) fn finish_share(&self) {
        if self.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.complete();
        }
    }

    fn complete(&self) {
        let (tx, outcome) = {
            let mut state = self.state.lock();

            if self.clear_mode == ClearMode::Eager {
                state.clear_workload();
            }

            let first = self.errors.lock().first().cloned();

            let outcome = match self.status() {
                Status::Terminating => Err(first.map_or(PoolError::Terminated, PoolError::Task)),
                _ => {
                    self.status.store(Status::Ready, Ordering::Release);
                    first.map_or(Ok(()), |record| Err(PoolError::Task(record)))
                }
            };

            (state.completion.take(), outcome)
        };

        debug!("dispatch completed: {outcome:?}");

        if let Some(tx) = tx {
            // The caller may have dropped the handle already
            let _ = tx.send(outcome);
        }
    }
}
