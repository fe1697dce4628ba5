//! ## gardenhose-telemetry::metrics
//! **Prometheus counters for the ingestion pipeline**

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub posts_received: IntCounter,
    pub posts_classified: IntCounter,
    pub posts_dropped: IntCounter,
    pub batches_succeeded: IntCounter,
    pub batches_failed: IntCounter,
    pub queue_depth: IntGauge,
    pub classify_latency: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let posts_received =
            IntCounter::new("gardenhose_posts_received_total", "Posts pushed onto the work queue")?;
        let posts_classified = IntCounter::new(
            "gardenhose_posts_classified_total",
            "Posts included in a successful classification call",
        )?;
        let posts_dropped = IntCounter::new(
            "gardenhose_posts_dropped_total",
            "Posts discarded by a failed call or an unflushed partial batch",
        )?;
        let batches_succeeded = IntCounter::new(
            "gardenhose_batches_succeeded_total",
            "Classification calls that returned results",
        )?;
        let batches_failed = IntCounter::new(
            "gardenhose_batches_failed_total",
            "Classification calls that returned an error",
        )?;
        let queue_depth = IntGauge::new("gardenhose_queue_depth", "Posts waiting for a worker")?;
        let classify_latency = Histogram::with_opts(
            HistogramOpts::new(
                "gardenhose_classify_latency_seconds",
                "Duration of classification calls",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        registry.register(Box::new(posts_received.clone()))?;
        registry.register(Box::new(posts_classified.clone()))?;
        registry.register(Box::new(posts_dropped.clone()))?;
        registry.register(Box::new(batches_succeeded.clone()))?;
        registry.register(Box::new(batches_failed.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(classify_latency.clone()))?;

        Ok(Self {
            registry,
            posts_received,
            posts_classified,
            posts_dropped,
            batches_succeeded,
            batches_failed,
            queue_depth,
            classify_latency,
        })
    }

    /// Renders every registered metric in the text exposition format.
    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn record_success(&self, posts: usize, seconds: f64) {
        self.batches_succeeded.inc();
        self.posts_classified.inc_by(posts as u64);
        self.classify_latency.observe(seconds);
    }

    pub fn record_failure(&self, posts: usize, seconds: f64) {
        self.batches_failed.inc();
        self.posts_dropped.inc_by(posts as u64);
        self.classify_latency.observe(seconds);
    }
}
