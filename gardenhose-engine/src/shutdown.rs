//! Orderly, bounded shutdown of the worker pool.
//!
//! One stop sentinel is enqueued per live worker, giving up on a full queue at
//! the deadline. Exits are then awaited in
//! `poll_interval` slices until every worker has reported or the overall
//! timeout passes. Workers still busy at the deadline are reported as stuck
//! and left detached. The queue is drained only when nobody is stuck.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crossbeam::channel::RecvTimeoutError;
use gardenhose_config::ShutdownConfig;
use gardenhose_core::{QueueError, QueueItem, WorkQueue};
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::pool::WorkerPool;
use crate::worker::WorkerReport;

/// Timing for [`ShutdownCoordinator::shutdown`].
#[derive(Debug, Clone, Copy)]
pub struct ShutdownCoordinator {
    poll_interval: Duration,
    timeout: Duration,
}

/// What happened to each worker during shutdown.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Reports of workers that exited cleanly, ordered by id.
    pub reports: Vec<WorkerReport>,
    /// Workers that did not exit before the deadline.
    pub stuck: Vec<usize>,
    /// Workers whose thread panicked.
    pub panicked: Vec<usize>,
    /// Stop sentinels that could not be enqueued before the deadline.
    pub unsent_sentinels: usize,
    /// Items left in the queue after the sentinels, discarded unprocessed.
    pub discarded: usize,
    /// Whether every enqueued item was acknowledged.
    pub drained: bool,
}

impl ShutdownReport {
    pub fn classified(&self) -> u64 {
        self.reports.iter().map(|r| r.classified).sum()
    }

    pub fn dropped(&self) -> u64 {
        self.reports.iter().map(|r| r.dropped).sum()
    }

    pub fn failed_batches(&self) -> u64 {
        self.reports.iter().map(|r| r.batches_failed).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.stuck.is_empty() && self.panicked.is_empty() && self.drained
    }
}

impl ShutdownCoordinator {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            timeout,
        }
    }

    pub fn from_config(config: &ShutdownConfig) -> Self {
        Self::new(
            Duration::from_millis(config.poll_interval_ms),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Stops every worker in `pool` and drains `queue`.
    ///
    /// Never waits longer than the configured timeout in total.
    pub fn shutdown(
        &self,
        pool: WorkerPool,
        queue: &WorkQueue<QueueItem>,
    ) -> Result<ShutdownReport, EngineError> {
        let deadline = Instant::now() + self.timeout;
        let WorkerPool { workers, exits } = pool;

        let mut exited = BTreeSet::new();
        while let Ok(id) = exits.try_recv() {
            exited.insert(id);
        }

        let live = workers.iter().filter(|w| !exited.contains(&w.id)).count();
        info!(workers = live, "Stopping workers");
        let mut unsent = 0;
        for sent in 0..live {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match queue.put_timeout(QueueItem::Stop, remaining) {
                Ok(()) => {}
                Err(QueueError::Timeout) => {
                    unsent = live - sent;
                    warn!(unsent, "work queue stayed full, not every worker got a stop sentinel");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        while exited.len() < workers.len() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match exits.recv_timeout(self.poll_interval.min(deadline - now)) {
                Ok(id) => {
                    debug!(worker = id, "worker exited");
                    exited.insert(id);
                }
                Err(RecvTimeoutError::Timeout) => {
                    debug!(
                        remaining = workers.len() - exited.len(),
                        "waiting for workers to finish"
                    );
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut report = ShutdownReport {
            unsent_sentinels: unsent,
            ..Default::default()
        };
        for worker in workers {
            if !exited.contains(&worker.id) {
                warn!(worker = worker.id, "worker did not stop before the deadline");
                report.stuck.push(worker.id);
                continue;
            }
            match worker.handle.join() {
                Ok(worker_report) => report.reports.push(worker_report),
                Err(_) => {
                    error!(worker = worker.id, "worker thread panicked");
                    report.panicked.push(worker.id);
                }
            }
        }
        report.reports.sort_by_key(|r| r.id);

        if report.stuck.is_empty() {
            while let Some(_item) = queue.try_get()? {
                queue.task_done()?;
                report.discarded += 1;
            }
            if report.discarded > 0 {
                warn!(discarded = report.discarded, "discarded items left after stop");
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            report.drained = queue.join_timeout(remaining);
        }

        info!(
            classified = report.classified(),
            dropped = report.dropped(),
            stuck = report.stuck.len(),
            "Finished..."
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::test_support::*;
    use crate::worker::BatchSettings;
    use crossbeam::channel;
    use gardenhose_classifier::{Classification, ClassifyError, ClassifyTags, Classifier};
    use gardenhose_telemetry::MetricsRecorder;
    use std::sync::Arc;

    fn spawn(
        threads: usize,
        tpc: usize,
        queue: &WorkQueue<QueueItem>,
        classifier: Arc<dyn Classifier>,
    ) -> WorkerPool {
        WorkerPool::spawn(
            threads,
            queue,
            classifier,
            Arc::new(BatchSettings::new(tpc, tags())),
            Arc::new(MetricsRecorder::new().unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn stops_every_worker_and_accounts_for_every_post() {
        let queue = WorkQueue::unbounded();
        let classifier = Arc::new(RecordingClassifier::default());
        let pool = spawn(3, 2, &queue, classifier.clone());

        let texts: Vec<String> = (0..12).map(|i| format!("post {i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        enqueue(&queue, &refs);

        let report = ShutdownCoordinator::new(Duration::from_millis(20), Duration::from_secs(10))
            .shutdown(pool, &queue)
            .unwrap();

        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.reports.len(), 3);
        assert_eq!(report.classified() + report.dropped(), 12);
        assert!(classifier.calls.lock().iter().all(|batch| batch.len() == 2));
        assert_eq!(queue.unfinished(), 0);
    }

    #[test]
    fn exited_workers_are_not_sent_another_sentinel() {
        let queue = WorkQueue::unbounded();
        let pool = spawn(2, 1, &queue, Arc::new(RecordingClassifier::default()));
        queue.put(QueueItem::Stop).unwrap();
        let waited = Instant::now();
        while pool.exits.is_empty() && waited.elapsed() < Duration::from_secs(5) {
            std::thread::yield_now();
        }
        assert_eq!(pool.exits.len(), 1);

        let report = ShutdownCoordinator::new(Duration::from_millis(20), Duration::from_secs(10))
            .shutdown(pool, &queue)
            .unwrap();

        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.reports.len(), 2);
        assert_eq!(report.discarded, 0);
        assert!(queue.is_empty());
    }

    struct BlockingClassifier {
        release: channel::Receiver<()>,
    }

    impl Classifier for BlockingClassifier {
        fn classify(
            &self,
            _texts: &[String],
            _tags: &ClassifyTags,
        ) -> Result<Classification, ClassifyError> {
            let _ = self.release.recv();
            Err(ClassifyError::Api {
                status: 503,
                body: "released".into(),
            })
        }
    }

    #[test]
    fn stuck_worker_is_reported_within_the_timeout() {
        let (release_tx, release_rx) = channel::unbounded();
        let queue = WorkQueue::unbounded();
        let pool = spawn(
            1,
            1,
            &queue,
            Arc::new(BlockingClassifier { release: release_rx }),
        );
        enqueue(&queue, &["hangs"]);
        // let the worker pick the post up before the sentinel arrives
        while !queue.is_empty() {
            std::thread::yield_now();
        }

        let started = Instant::now();
        let report = ShutdownCoordinator::new(Duration::from_millis(20), Duration::from_millis(200))
            .shutdown(pool, &queue)
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.stuck, vec![0]);
        assert!(!report.drained);
        assert!(!report.is_clean());

        release_tx.send(()).unwrap();
        assert!(queue.join_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn full_bounded_queue_does_not_block_past_the_timeout() {
        let (release_tx, release_rx) = channel::unbounded();
        let queue = WorkQueue::with_capacity(2);
        let pool = spawn(
            1,
            1,
            &queue,
            Arc::new(BlockingClassifier { release: release_rx }),
        );
        enqueue(&queue, &["hangs"]);
        while !queue.is_empty() {
            std::thread::yield_now();
        }
        enqueue(&queue, &["queued 1", "queued 2"]);

        let (done_tx, done_rx) = channel::bounded(1);
        let shutdown_queue = queue.share();
        std::thread::spawn(move || {
            let report =
                ShutdownCoordinator::new(Duration::from_millis(20), Duration::from_millis(200))
                    .shutdown(pool, &shutdown_queue);
            let _ = done_tx.send(report);
        });

        let report = done_rx
            .recv_timeout(Duration::from_secs(3))
            .expect("shutdown should return once its timeout passes")
            .unwrap();
        assert_eq!(report.stuck, vec![0]);
        assert_eq!(report.unsent_sentinels, 1);
        assert!(!report.is_clean());

        for _ in 0..3 {
            release_tx.send(()).unwrap();
        }
        queue.put(QueueItem::Stop).unwrap();
        assert!(queue.join_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn coordinator_follows_config() {
        let coordinator = ShutdownCoordinator::from_config(&ShutdownConfig::default());
        assert_eq!(coordinator.poll_interval, Duration::from_secs(1));
        assert_eq!(coordinator.timeout, Duration::from_secs(30));
    }
}
