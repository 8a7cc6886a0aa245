use std::thread::{self, JoinHandle};

/// Handle for managing a worker
pub(crate) struct WorkerHandle {
    id: usize,
    thread_handle: JoinHandle<()>,
}

impl WorkerHandle {
    pub(crate) fn new(id: usize, thread_handle: JoinHandle<()>) -> Self {
        Self { id, thread_handle }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker thread to exit. The pool must be terminating.
    pub(crate) fn join(self) -> thread::Result<()> {
        self.thread_handle.join()
    }
}
