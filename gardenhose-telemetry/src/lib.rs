//! # Gardenhose Telemetry
//!
//! Crate for logging setup and pipeline metrics.

pub mod logging;
pub mod metrics;

pub use metrics::MetricsRecorder;
