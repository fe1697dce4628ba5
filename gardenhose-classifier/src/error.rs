use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Classifier transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Classifier returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed classifier response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}
