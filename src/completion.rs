use crate::PoolError;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

pub(crate) type Outcome = Result<(), PoolError>;

/// Create the write and read ends for one dispatch
pub(crate) fn pair() -> (Sender<Outcome>, CompletionHandle) {
    let (tx, rx) = channel::bounded(1);
    (tx, CompletionHandle { rx })
}

/// Result of one dispatch, resolved by the last worker to finish
#[derive(Debug)]
pub struct CompletionHandle {
    rx: Receiver<Outcome>,
}

impl CompletionHandle {
    /// Block until the dispatch completes
    pub fn wait(self) -> Outcome {
        self.rx.recv().unwrap_or(Err(PoolError::Abandoned))
    }

    /// Block for at most `timeout`. Returns `None` if still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(PoolError::Abandoned)),
        }
    }

    /// Check the outcome without blocking
    pub fn try_wait(&self) -> Option<Outcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(PoolError::Abandoned)),
        }
    }
}
