//! Fixed set of named worker threads sharing one queue.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use gardenhose_classifier::Classifier;
use gardenhose_core::{QueueItem, WorkQueue};
use gardenhose_telemetry::MetricsRecorder;
use tracing::{error, info};

use crate::error::EngineError;
use crate::worker::{run_worker, BatchSettings, WorkerReport};

/// Sends the worker id when dropped, so exits are observed even on panic.
struct ExitNotice {
    id: usize,
    tx: Sender<usize>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.tx.send(self.id);
    }
}

pub(crate) struct WorkerHandle {
    pub(crate) id: usize,
    pub(crate) handle: JoinHandle<WorkerReport>,
}

/// Running workers plus the channel their exits are announced on.
pub struct WorkerPool {
    pub(crate) workers: Vec<WorkerHandle>,
    pub(crate) exits: Receiver<usize>,
}

impl WorkerPool {
    /// Starts `threads` workers named `mapper-{i}`.
    ///
    /// If a thread cannot be spawned, the workers already running are sent a
    /// stop sentinel each and the spawn error is returned.
    pub fn spawn(
        threads: usize,
        queue: &WorkQueue<QueueItem>,
        classifier: Arc<dyn Classifier>,
        settings: Arc<BatchSettings>,
        metrics: Arc<MetricsRecorder>,
    ) -> Result<Self, EngineError> {
        let (tx, exits) = channel::unbounded();
        let mut workers = Vec::with_capacity(threads);

        for id in 0..threads {
            let worker_queue = queue.share();
            let classifier = Arc::clone(&classifier);
            let settings = Arc::clone(&settings);
            let metrics = Arc::clone(&metrics);
            let notice = ExitNotice { id, tx: tx.clone() };

            let spawned = thread::Builder::new()
                .name(format!("mapper-{id}"))
                .spawn(move || {
                    let _notice = notice;
                    run_worker(id, &worker_queue, classifier.as_ref(), &settings, &metrics)
                });

            match spawned {
                Ok(handle) => workers.push(WorkerHandle { id, handle }),
                Err(e) => {
                    error!("failed to spawn worker {id}: {e}");
                    for _ in &workers {
                        let _ = queue.put(QueueItem::Stop);
                    }
                    return Err(EngineError::Spawn(e));
                }
            }
        }

        info!(threads, tpc = settings.tpc, "worker pool started");
        Ok(Self { workers, exits })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Worker ids in spawn order.
    pub fn ids(&self) -> Vec<usize> {
        self.workers.iter().map(|w| w.id).collect()
    }
}
