//! # gardenhose-stream
//!
//! Ingestion side of the pipeline: a filtered subscription to the public post
//! stream, decoded into [`Post`](gardenhose_core::Post)s and handed to a
//! [`StreamListener`].
//!
//! Reconnection policy lives here; deciding what to do about a fatal error
//! belongs to the caller of [`StreamSource::filter`].

use std::sync::atomic::AtomicBool;

pub mod client;
pub mod error;
pub mod filter;
pub mod listener;
pub mod message;
pub mod oauth;

pub use client::{BackoffPolicy, FilterStream};
pub use error::StreamError;
pub use filter::{Predicate, StreamFilter};
pub use listener::{FnListener, QueueListener, StreamListener};
pub use message::{Notice, StreamMessage};
pub use oauth::OAuth1;

/// A live filtered subscription.
pub trait StreamSource {
    /// Delivers events to `listener` until `terminate` is set (returning
    /// `Ok`) or an unrecoverable error occurs.
    fn filter(
        &mut self,
        filter: &StreamFilter,
        listener: &dyn StreamListener,
        terminate: &AtomicBool,
    ) -> Result<(), StreamError>;
}
