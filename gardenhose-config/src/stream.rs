//! Streaming endpoint connection parameters.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Filtered stream connection settings.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct StreamConfig {
    /// Filter endpoint URL.
    #[serde(default = "default_endpoint")]
    #[validate(url)]
    pub endpoint: String,

    /// Reconnect attempts before giving up. Unset means reconnect forever.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// TCP connect timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub connect_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://stream.twitter.com/1.1/statuses/filter.json".into()
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_retries: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}
