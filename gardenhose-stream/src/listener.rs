//! Callbacks invoked by a stream source for each event.

use std::sync::Arc;

use gardenhose_core::{Post, QueueItem, WorkQueue};
use gardenhose_telemetry::MetricsRecorder;
use tracing::{debug, error, trace, warn};

use crate::message::Notice;
use crate::StreamError;

/// Receives events from a [`StreamSource`](crate::StreamSource).
///
/// Callbacks must not terminate the process; deciding whether an error is
/// fatal belongs to the driver.
pub trait StreamListener: Send + Sync {
    /// Called once per incoming post.
    fn on_post(&self, post: Post);

    /// Called for transport, HTTP and decode errors.
    fn on_error(&self, error: &StreamError);

    /// Called for control messages. Ignored by default.
    fn on_notice(&self, notice: &Notice) {
        trace!(?notice, "stream notice");
    }
}

/// Listener assembled from two closures.
pub struct FnListener<P, E> {
    on_post: P,
    on_error: E,
}

impl<P, E> FnListener<P, E>
where
    P: Fn(Post) + Send + Sync,
    E: Fn(&StreamError) + Send + Sync,
{
    pub fn new(on_post: P, on_error: E) -> Self {
        Self { on_post, on_error }
    }
}

impl<P, E> StreamListener for FnListener<P, E>
where
    P: Fn(Post) + Send + Sync,
    E: Fn(&StreamError) + Send + Sync,
{
    fn on_post(&self, post: Post) {
        (self.on_post)(post)
    }

    fn on_error(&self, error: &StreamError) {
        (self.on_error)(error)
    }
}

/// Pushes every post onto the shared work queue.
pub struct QueueListener {
    queue: WorkQueue<QueueItem>,
    metrics: Arc<MetricsRecorder>,
}

impl QueueListener {
    pub fn new(queue: WorkQueue<QueueItem>, metrics: Arc<MetricsRecorder>) -> Self {
        Self { queue, metrics }
    }
}

impl StreamListener for QueueListener {
    fn on_post(&self, post: Post) {
        trace!(id = ?post.id, "queueing post");
        match self.queue.put(post.into()) {
            Ok(()) => {
                self.metrics.posts_received.inc();
                self.metrics.queue_depth.set(self.queue.len() as i64);
            }
            Err(e) => self.on_error(&StreamError::Queue(e)),
        }
    }

    fn on_error(&self, error: &StreamError) {
        error!("Caught a stream error: {error}");
    }

    fn on_notice(&self, notice: &Notice) {
        match notice {
            Notice::Limit { undelivered } => {
                warn!(undelivered, "stream is rate limited, posts were withheld")
            }
            Notice::Disconnect { code, reason } => {
                warn!(?code, %reason, "stream sent a disconnect notice")
            }
            Notice::Warning { code, message } => warn!(?code, %message, "stream warning"),
            Notice::Delete { id } => debug!(?id, "post deleted upstream"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_listener_enqueues_posts_in_order() {
        let queue = WorkQueue::unbounded();
        let metrics = Arc::new(MetricsRecorder::new().unwrap());
        let listener = QueueListener::new(queue.share(), metrics.clone());

        listener.on_post(Post::new("a"));
        listener.on_post(Post::new("b"));

        assert_eq!(queue.get().unwrap(), QueueItem::Post(Post::new("a")));
        assert_eq!(queue.get().unwrap(), QueueItem::Post(Post::new("b")));
        assert_eq!(metrics.posts_received.get(), 2);
        assert_eq!(metrics.queue_depth.get(), 2);
        assert_eq!(queue.unfinished(), 2);
    }

    #[test]
    fn queue_listener_survives_errors() {
        let queue = WorkQueue::unbounded();
        let metrics = Arc::new(MetricsRecorder::new().unwrap());
        let listener = QueueListener::new(queue.share(), metrics);

        listener.on_error(&StreamError::Status { status: 503 });
        listener.on_post(Post::new("still running"));
        assert_eq!(queue.len(), 1);
    }
}
