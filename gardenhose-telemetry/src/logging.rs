//! ## gardenhose-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! The subscriber is installed once by the binary. Components log through the
//! `tracing` macros with structured fields (`worker`, `batch_len`, ...).

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// Maps a `-v` count to a default filter directive.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` wins over the verbosity-derived level when set.
pub fn init(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity))),
        )
        .with_thread_names(true)
        .with_span_events(FmtSpan::NONE)
        .try_init()
}
