//! Logging configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Telemetry configuration.
#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TelemetryConfig {
    /// 0 = info, 1 = debug, 2 or more = trace. `RUST_LOG` takes precedence.
    #[serde(default)]
    #[validate(range(max = 3))]
    pub verbosity: u8,
}
