use super::Share;
use std::sync::Arc;

/// Task-claiming algorithm of a worker
pub(crate) trait Strategy: Send + 'static {
    /// Prepare the cursor for a new dispatch
    fn arm(&mut self, _id: usize, _size: usize) {}

    /// Run tasks until the share is exhausted or claiming stops.
    /// May be called again after a captured panic and must resume past the failed task.
    fn run_share(&mut self, share: &Share<'_>);

    /// Called once per dispatch before the share
    fn enter(&mut self) {}

    /// Called once per dispatch after the share
    fn exit(&mut self) {}
}

/// Per-thread registration with an external stateful collaborator
pub trait ThreadResource: Send + Sync {
    /// Runs on the worker thread once per dispatch, before it claims any task.
    /// A panic here is handled by the error policy and the worker skips its share.
    fn on_thread_enter(&self);

    /// Runs on the worker thread once per dispatch, after its share is done.
    /// Also runs when `on_thread_enter` or a task panicked, unless the error policy is `None`.
    fn on_thread_exit(&self);
}

/// How tasks of a workload are distributed among workers
#[derive(Clone, Default)]
pub enum QueueKind {
    /// Workers claim the next index from a shared counter
    #[default]
    Shared,
    /// Worker `i` of `N` runs tasks `i, i + N, i + 2N, ...`
    Partitioned,
    /// Like `Shared`, wrapping every dispatch in the resource's enter/exit hooks
    ResourceScoped(Arc<dyn ThreadResource>),
}

#[derive(Default)]
pub(crate) struct SharedQueue;

impl Strategy for SharedQueue {
    fn run_share(&mut self, share: &Share<'_>) {
        loop {
            let idx = share.claim_next();
            if idx >= share.len() || !share.can_claim() {
                break;
            }

            share.execute(idx);
        }
    }
}

#[derive(Default)]
pub(crate) struct PartitionedQueue {
    next: usize,
    stride: usize,
}

impl Strategy for PartitionedQueue {
    fn arm(&mut self, id: usize, size: usize) {
        self.next = id;
        self.stride = size;
    }

    fn run_share(&mut self, share: &Share<'_>) {
        while self.next < share.len() && share.can_claim() {
            let idx = self.next;
            // Step first so a panicking task is skipped on resume
            self.next += self.stride;
            share.execute(idx);
        }
    }
}

pub(crate) struct ResourceScopedQueue {
    queue: SharedQueue,
    resource: Arc<dyn ThreadResource>,
}

impl ResourceScopedQueue {
    pub(crate) fn new(resource: Arc<dyn ThreadResource>) -> Self {
        Self {
            queue: SharedQueue,
            resource,
        }
    }
}

impl Strategy for ResourceScopedQueue {
    fn run_share(&mut self, share: &Share<'_>) {
        self.queue.run_share(share)
    }

    fn enter(&mut self) {
        self.resource.on_thread_enter()
    }

    fn exit(&mut self) {
        self.resource.on_thread_exit()
    }
}
