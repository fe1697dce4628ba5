use gardenhose_core::QueueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Stream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Stream read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("Stream endpoint rejected the connection with HTTP {status}")]
    Rejected { status: u16 },

    #[error("Giving up after {attempts} failed connection attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Stream disconnected: {reason}")]
    Disconnected { code: Option<u64>, reason: String },

    #[error("Undecodable stream message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Filter needs at least one track keyword or bounding box")]
    EmptyFilter,

    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("Could not enqueue post: {0}")]
    Queue(#[from] QueueError),
}

impl StreamError {
    /// Errors the driver cannot recover from by reconnecting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StreamError::Rejected { .. }
                | StreamError::RetriesExhausted { .. }
                | StreamError::EmptyFilter
                | StreamError::Signing(_)
        )
    }
}
