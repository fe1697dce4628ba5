//! Worker pool and shutdown parameters.
//!
//! Controls how posts are batched and how many classification calls can be
//! in flight at once.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Worker pool configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct WorkersConfig {
    /// Number of worker threads dedicated to classification.
    #[serde(default = "default_threads")]
    #[validate(range(min = 1, max = 512))]
    pub threads: usize,

    /// Posts per classification call (batch size threshold).
    #[serde(default = "default_tpc")]
    #[validate(range(min = 1, max = 10000))]
    pub tpc: usize,

    /// Ask the classifier for sentiment analysis.
    #[serde(default)]
    pub sentiment: bool,

    /// Bound on pending posts. 0 means unbounded.
    #[serde(default)]
    pub queue_capacity: usize,

    /// Classify a partially filled batch when a worker is told to stop,
    /// instead of dropping it.
    #[serde(default)]
    pub flush_partial_on_stop: bool,
}

fn default_threads() -> usize {
    10
}

fn default_tpc() -> usize {
    500
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            tpc: default_tpc(),
            sentiment: false,
            queue_capacity: 0,
            flush_partial_on_stop: false,
        }
    }
}

/// Orderly shutdown timing.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ShutdownConfig {
    /// How long each wait for a worker exit lasts before re-polling (milliseconds).
    #[serde(default = "default_poll_interval")]
    #[validate(range(min = 10, max = 60000))]
    pub poll_interval_ms: u64,

    /// Upper bound on the whole shutdown sequence (seconds).
    #[serde(default = "default_timeout")]
    #[validate(range(min = 1, max = 3600))]
    pub timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    30
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            timeout_secs: default_timeout(),
        }
    }
}
