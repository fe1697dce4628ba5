//! Ingestion driver.
//!
//! [`Mapper::run`] owns one pipeline run: it starts the workers, subscribes
//! to the stream on the calling thread and, once the stream returns for any
//! reason, performs the bounded shutdown.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use gardenhose_classifier::Classifier;
use gardenhose_config::GardenhoseConfig;
use gardenhose_core::{QueueItem, WorkQueue};
use gardenhose_stream::{Predicate, QueueListener, StreamError, StreamFilter, StreamSource};
use gardenhose_telemetry::MetricsRecorder;
use tracing::{error, info, instrument};

use crate::error::EngineError;
use crate::pool::WorkerPool;
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};
use crate::worker::BatchSettings;

/// Outcome of a finished run.
#[derive(Debug)]
pub struct RunSummary {
    pub shutdown: ShutdownReport,
    /// Set when the stream ended on its own rather than on request.
    pub stream_error: Option<StreamError>,
}

impl RunSummary {
    pub fn interrupted(&self) -> bool {
        self.stream_error.is_none()
    }

    pub fn classified(&self) -> u64 {
        self.shutdown.classified()
    }

    pub fn dropped(&self) -> u64 {
        self.shutdown.dropped()
    }
}

/// Ties a stream subscription to the classification worker pool.
pub struct Mapper {
    config: GardenhoseConfig,
    classifier: Arc<dyn Classifier>,
    metrics: Arc<MetricsRecorder>,
}

impl Mapper {
    pub fn new(
        config: GardenhoseConfig,
        classifier: Arc<dyn Classifier>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            config,
            classifier,
            metrics,
        }
    }

    pub fn config(&self) -> &GardenhoseConfig {
        &self.config
    }

    /// Runs the pipeline until `terminate` is set or the stream fails for good.
    ///
    /// Stream failures end the run but are not returned as `Err`; they are
    /// reported in [`RunSummary::stream_error`] after the workers have been
    /// stopped. `Err` means the pipeline could not be started or stopped.
    #[instrument(skip_all, name = "mapper")]
    pub fn run(
        &self,
        source: &mut dyn StreamSource,
        terminate: &AtomicBool,
    ) -> Result<RunSummary, EngineError> {
        let filter = StreamFilter::from_config(&self.config.filter)?;
        let settings = Arc::new(BatchSettings::from_config(&self.config));
        let queue = WorkQueue::with_capacity(self.config.workers.queue_capacity);

        let pool = WorkerPool::spawn(
            self.config.workers.threads,
            &queue,
            Arc::clone(&self.classifier),
            Arc::clone(&settings),
            Arc::clone(&self.metrics),
        )?;

        match &filter.predicate {
            Predicate::Track(words) => info!(
                threads = pool.len(),
                tpc = settings.tpc,
                languages = ?filter.languages,
                "Streaming posts tracking {} keywords",
                words.len()
            ),
            Predicate::Locations(boxes) => info!(
                threads = pool.len(),
                tpc = settings.tpc,
                languages = ?filter.languages,
                "Streaming posts inside {} bounding boxes",
                boxes.len()
            ),
        }

        let listener = QueueListener::new(queue.share(), Arc::clone(&self.metrics));
        let stream_error = match source.filter(&filter, &listener, terminate) {
            Ok(()) => {
                info!("Stream stopped on request");
                None
            }
            Err(e) => {
                error!("Stream ended: {e}");
                Some(e)
            }
        };

        let shutdown = ShutdownCoordinator::from_config(&self.config.shutdown).shutdown(pool, &queue)?;
        Ok(RunSummary {
            shutdown,
            stream_error,
        })
    }

    /// Stops a pool that was started outside [`Mapper::run`].
    pub fn stop(
        &self,
        pool: WorkerPool,
        queue: &WorkQueue<QueueItem>,
    ) -> Result<ShutdownReport, EngineError> {
        ShutdownCoordinator::from_config(&self.config.shutdown).shutdown(pool, queue)
    }
}
