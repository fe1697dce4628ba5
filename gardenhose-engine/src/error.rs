use gardenhose_core::QueueError;
use gardenhose_stream::StreamError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Stream setup failed: {0}")]
    Stream(#[from] StreamError),

    #[error("Could not spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Work queue error: {0}")]
    Queue(#[from] QueueError),
}
