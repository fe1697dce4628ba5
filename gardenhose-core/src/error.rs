use thiserror::Error;

/// Shared work queue error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Work queue capacity exceeded")]
    Full,

    #[error("Timed out waiting for work queue capacity")]
    Timeout,

    #[error("Work queue channel disconnected")]
    Disconnected,

    #[error("task_done() called more times than items were enqueued")]
    TaskDoneUnderflow,
}
