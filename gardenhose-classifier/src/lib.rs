//! # gardenhose-classifier
//!
//! Client for the remote content-classification service.
//!
//! Workers depend on the [`Classifier`] trait only; [`HttpClassifier`] is the
//! production implementation.

pub mod client;
pub mod error;
pub mod request;

pub use client::HttpClassifier;
pub use error::ClassifyError;
pub use request::{Classification, ClassifyTags};

/// Sends a batch of texts for classification.
///
/// Implementations are shared by every worker thread; a call blocks only the
/// calling worker.
pub trait Classifier: Send + Sync {
    fn classify(&self, texts: &[String], tags: &ClassifyTags)
        -> Result<Classification, ClassifyError>;
}
