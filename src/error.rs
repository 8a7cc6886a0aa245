use crate::Status;
use std::{any::Any, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    /// The workload can't be modified in the current status.
    #[error("workload can't be modified while the pool is {status:?}")]
    InvalidState { status: Status },
    /// A task of the dispatch panicked.
    #[error(transparent)]
    Task(FailureRecord),
    /// The pool was terminated before the dispatch finished.
    #[error("pool terminated before the workload completed")]
    Terminated,
    /// The pool went away without resolving the dispatch.
    #[error("pool dropped before resolving the workload")]
    Abandoned,
    /// A worker thread couldn't be started.
    #[error("{}", _0)]
    Spawn(#[from] io::Error),
}

/// Failure captured from a panicking task or per-dispatch hook
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task{} failed on worker {worker}: {message}", index_suffix(.task))]
pub struct FailureRecord {
    /// Id of the worker that ran the task
    pub worker: usize,
    /// Index of the task in the workload, `None` for a hook failure
    pub task: Option<usize>,
    /// Panic message
    pub message: String,
}

impl FailureRecord {
    pub(crate) fn from_panic(
        worker: usize,
        task: Option<usize>,
        payload: &(dyn Any + Send),
    ) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("unknown panic payload")
        };

        Self {
            worker,
            task,
            message,
        }
    }
}

fn index_suffix(task: &Option<usize>) -> String {
    task.map(|idx| format!(" {idx}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_from_str_and_string_payloads() {
        let rec = FailureRecord::from_panic(1, Some(4), &"boom");
        assert_eq!(rec.message, "boom");
        assert_eq!(rec.to_string(), "task 4 failed on worker 1: boom");

        let rec = FailureRecord::from_panic(0, None, &String::from("owned"));
        assert_eq!(rec.message, "owned");
        assert_eq!(rec.to_string(), "task failed on worker 0: owned");

        let rec = FailureRecord::from_panic(0, None, &42u32);
        assert_eq!(rec.message, "unknown panic payload");
    }
}
