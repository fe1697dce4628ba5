//! Items carried by the shared work queue.

use serde::{Deserialize, Serialize};

/// A single post received from the stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Platform identifier, when the stream supplied one.
    pub id: Option<String>,

    /// Text submitted for classification.
    pub text: String,

    /// Language reported by the platform.
    pub lang: Option<String>,

    /// Remaining payload, carried through untouched.
    pub meta: serde_json::Value,
}

impl Post {
    /// Creates a post with only a text payload.
    #[inline]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            lang: None,
            meta: serde_json::Value::Null,
        }
    }
}

/// Unit of work on the queue: a post, or the signal for one worker to stop.
#[derive(Clone, Debug, PartialEq)]
pub enum QueueItem {
    Post(Post),
    Stop,
}

impl From<Post> for QueueItem {
    fn from(post: Post) -> Self {
        QueueItem::Post(post)
    }
}
