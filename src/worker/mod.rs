pub(crate) mod handle;
pub(crate) mod strategy;

use crate::{inner::Shared, ErrorPolicy, FailureRecord, Status, Task};
use handle::WorkerHandle;
use log::{debug, error};
use std::{
    cell::Cell,
    io,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
};
use strategy::Strategy;

/// A worker processing its share of every dispatch on a dedicated thread
pub(crate) struct Worker<S> {
    id: usize,
    shared: Arc<Shared>,
    strategy: S,
}

impl<S: Strategy> Worker<S> {
    pub(crate) fn new(id: usize, shared: Arc<Shared>, strategy: S) -> Self {
        Self {
            id,
            shared,
            strategy,
        }
    }

    /// Start the worker
    pub(crate) fn run(self, name: String) -> io::Result<WorkerHandle> {
        let id = self.id;
        let thread_handle = thread::Builder::new()
            .name(name)
            .spawn(move || self.worker_loop())?;

        Ok(WorkerHandle::new(id, thread_handle))
    }

    /// Worker execution loop
    fn worker_loop(self) {
        let Worker {
            id,
            shared,
            mut strategy,
        } = self;

        let _guard = PanicGuard(id);

        while let Some(workload) = wait_for_work(&shared, id) {
            strategy.arm(id, shared.size);

            let share = Share {
                worker: id,
                workload: &workload,
                shared: &shared,
                current: Cell::new(None),
            };

            match shared.error_policy {
                // Panics unwind straight through the worker thread
                ErrorPolicy::None => {
                    strategy.enter();
                    strategy.run_share(&share);
                    strategy.exit();
                }
                ErrorPolicy::Ignore | ErrorPolicy::Terminate => {
                    if guard_hook(&share, || strategy.enter()) {
                        run_guarded(&mut strategy, &share);
                    }
                    guard_hook(&share, || strategy.exit());
                }
            }

            drop(workload);
            shared.finish_share();
        }

        debug!("batch worker {id} exits");
    }
}

/// Park until this worker is armed. `None` means the pool is terminating.
fn wait_for_work(shared: &Shared, id: usize) -> Option<Arc<Vec<Task>>> {
    let mut state = shared.state.lock();

    loop {
        // An armed worker must still report completion, even when terminating
        if state.armed[id] {
            state.armed[id] = false;
            return Some(Arc::clone(&state.workload));
        }

        if shared.status() == Status::Terminating {
            return None;
        }

        shared.wake.wait(&mut state);
    }
}

/// Run the share, resuming after every captured failure while claiming is allowed
fn run_guarded<S: Strategy>(strategy: &mut S, share: &Share<'_>) {
    loop {
        let result = panic::catch_unwind(AssertUnwindSafe(|| strategy.run_share(share)));

        let Err(payload) = result else {
            break;
        };

        let record = FailureRecord::from_panic(share.worker, share.current.get(), &*payload);
        share.shared.record_failure(record);

        if !share.can_claim() {
            break;
        }
    }
}

/// Run a per-dispatch hook, recording its panic as a failure not tied to a task
fn guard_hook(share: &Share<'_>, hook: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(()) => true,
        Err(payload) => {
            let record = FailureRecord::from_panic(share.worker, None, &*payload);
            share.shared.record_failure(record);
            false
        }
    }
}

/// One worker's view of the dispatched workload
pub(crate) struct Share<'a> {
    worker: usize,
    workload: &'a [Task],
    shared: &'a Shared,
    current: Cell<Option<usize>>,
}

impl Share<'_> {
    pub(crate) fn len(&self) -> usize {
        self.workload.len()
    }

    pub(crate) fn can_claim(&self) -> bool {
        self.shared.can_claim()
    }

    /// Claim the next index of the shared queue
    pub(crate) fn claim_next(&self) -> usize {
        self.shared
            .cursor
            .fetch_add(1, std::sync::atomic::Ordering::AcqRel)
    }

    pub(crate) fn execute(&self, idx: usize) {
        self.current.set(Some(idx));
        (self.workload[idx])();
    }
}

struct PanicGuard(usize);

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(
                "batch worker {} died on an unhandled task panic, its dispatch will never complete",
                self.0
            );
        }
    }
}
