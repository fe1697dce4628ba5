//! Batch accumulator loop run by each worker thread.
//!
//! States: accumulating, calling the classifier, stopped. A failed call is
//! logged together with the batch contents and the batch is dropped; the
//! worker carries on with the next batch. A stop sentinel ends the loop and
//! drops any partial batch unless `flush_partial_on_stop` is set.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use gardenhose_classifier::{Classifier, ClassifyTags};
use gardenhose_config::GardenhoseConfig;
use gardenhose_core::batch::render_texts;
use gardenhose_core::{Batch, QueueItem, WorkQueue};
use gardenhose_telemetry::MetricsRecorder;
use tracing::{debug, error, info, warn};

/// Batching parameters shared by every worker.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Posts per classification call.
    pub tpc: usize,
    pub tags: ClassifyTags,
    pub flush_partial_on_stop: bool,
}

impl BatchSettings {
    pub fn new(tpc: usize, tags: ClassifyTags) -> Self {
        Self {
            tpc,
            tags,
            flush_partial_on_stop: false,
        }
    }

    pub fn from_config(config: &GardenhoseConfig) -> Self {
        Self {
            tpc: config.workers.tpc,
            tags: ClassifyTags::new(config.classifier.namespace.clone(), config.workers.sentiment),
            flush_partial_on_stop: config.workers.flush_partial_on_stop,
        }
    }
}

/// Counters returned by a worker when it stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub id: usize,
    /// Queue items taken, sentinel included.
    pub dequeued: u64,
    /// Posts that were part of a successful call.
    pub classified: u64,
    pub batches_succeeded: u64,
    pub batches_failed: u64,
    /// Posts lost to failed calls or an unflushed partial batch.
    pub dropped: u64,
}

/// State owned by a single worker.
#[derive(Debug)]
pub struct WorkerState {
    report: WorkerReport,
    batch: Batch,
}

impl WorkerState {
    pub fn new(id: usize, tpc: usize) -> Self {
        Self {
            report: WorkerReport {
                id,
                ..Default::default()
            },
            batch: Batch::new(tpc),
        }
    }

    pub fn id(&self) -> usize {
        self.report.id
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn report(&self) -> &WorkerReport {
        &self.report
    }

    /// Applies one queue item. Returns `false` once the worker must stop.
    pub fn handle(
        &mut self,
        item: QueueItem,
        classifier: &dyn Classifier,
        settings: &BatchSettings,
        metrics: &MetricsRecorder,
    ) -> bool {
        self.report.dequeued += 1;
        match item {
            QueueItem::Post(post) => {
                if self.batch.push(post.text) {
                    self.classify_batch(classifier, settings, metrics);
                }
                true
            }
            QueueItem::Stop => {
                self.stop(classifier, settings, metrics);
                false
            }
        }
    }

    fn stop(
        &mut self,
        classifier: &dyn Classifier,
        settings: &BatchSettings,
        metrics: &MetricsRecorder,
    ) {
        if self.batch.is_empty() {
            return;
        }
        if settings.flush_partial_on_stop {
            debug!(worker = self.id(), batch_len = self.batch.len(), "flushing partial batch");
            self.classify_batch(classifier, settings, metrics);
        } else {
            let dropped = self.batch.len();
            warn!(
                worker = self.id(),
                dropped,
                batch = %self.batch.to_json(),
                "dropping partial batch on stop"
            );
            self.batch.clear();
            self.report.dropped += dropped as u64;
            metrics.posts_dropped.inc_by(dropped as u64);
        }
    }

    fn classify_batch(
        &mut self,
        classifier: &dyn Classifier,
        settings: &BatchSettings,
        metrics: &MetricsRecorder,
    ) {
        let texts = self.batch.take();
        let count = texts.len();
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            classifier.classify(&texts, &settings.tags)
        }));

        let failure = match outcome {
            Ok(Ok(classification)) => {
                let seconds = classification.duration.as_secs_f64();
                self.report.classified += count as u64;
                self.report.batches_succeeded += 1;
                metrics.record_success(count, seconds);
                info!(
                    worker = self.id(),
                    "Mapping {} posts in {:.3} seconds - worker total: {}",
                    count,
                    seconds,
                    self.report.classified
                );
                debug!(worker = self.id(), results = %classification.results, "classification results");
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("classifier panicked: {}", panic_message(&*payload)),
        };

        self.report.batches_failed += 1;
        self.report.dropped += count as u64;
        metrics.record_failure(count, started.elapsed().as_secs_f64());
        error!(
            worker = self.id(),
            batch_len = count,
            batch = %render_texts(&texts),
            "classification failed: {failure}"
        );
    }

    pub fn into_report(self) -> WorkerReport {
        self.report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".into()
    }
}

/// Consumes the queue until a stop sentinel arrives.
///
/// Every dequeued item, sentinel included, is acknowledged with `task_done`
/// once it has been handled.
pub fn run_worker(
    id: usize,
    queue: &WorkQueue<QueueItem>,
    classifier: &dyn Classifier,
    settings: &BatchSettings,
    metrics: &MetricsRecorder,
) -> WorkerReport {
    let mut state = WorkerState::new(id, settings.tpc);
    debug!(worker = id, tpc = state.batch().threshold(), "worker started");

    loop {
        let item = match queue.get() {
            Ok(item) => item,
            Err(e) => {
                error!(worker = id, "work queue unavailable: {e}");
                break;
            }
        };
        metrics.queue_depth.set(queue.len() as i64);

        let keep_going = state.handle(item, classifier, settings, metrics);
        if let Err(e) = queue.task_done() {
            error!(worker = id, "could not acknowledge queue item: {e}");
        }
        if !keep_going {
            break;
        }
    }

    let report = state.into_report();
    info!(
        worker = id,
        classified = report.classified,
        failed_batches = report.batches_failed,
        "worker stopped"
    );
    report
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use gardenhose_classifier::{Classification, ClassifyError, ClassifyTags, Classifier};
    use gardenhose_core::{Post, QueueItem, WorkQueue};
    use parking_lot::Mutex;

    /// Records every batch and succeeds.
    #[derive(Default)]
    pub struct RecordingClassifier {
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl Classifier for RecordingClassifier {
        fn classify(
            &self,
            texts: &[String],
            _tags: &ClassifyTags,
        ) -> Result<Classification, ClassifyError> {
            self.calls.lock().push(texts.to_vec());
            Ok(Classification {
                results: serde_json::json!({ "count": texts.len() }),
                duration: Duration::from_millis(3),
            })
        }
    }

    /// Fails the first `failures` calls, then records like [`RecordingClassifier`].
    pub struct FlakyClassifier {
        pub failures: usize,
        pub attempts: AtomicUsize,
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl FlakyClassifier {
        pub fn failing(failures: usize) -> Self {
            Self {
                failures,
                attempts: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Classifier for FlakyClassifier {
        fn classify(
            &self,
            texts: &[String],
            _tags: &ClassifyTags,
        ) -> Result<Classification, ClassifyError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(ClassifyError::Api {
                    status: 500,
                    body: "upstream exploded".into(),
                });
            }
            self.calls.lock().push(texts.to_vec());
            Ok(Classification {
                results: serde_json::Value::Null,
                duration: Duration::from_millis(1),
            })
        }
    }

    pub fn tags() -> ClassifyTags {
        ClassifyTags::new("ns.test", false)
    }

    pub fn enqueue(queue: &WorkQueue<QueueItem>, texts: &[&str]) {
        for text in texts {
            queue.put(QueueItem::Post(Post::new(*text))).unwrap();
        }
    }
}
