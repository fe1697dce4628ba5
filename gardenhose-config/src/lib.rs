//! # Gardenhose Configuration System
//!
//! Layered configuration for the stream-to-classifier pipeline.
//!
//! ## Layers (lowest to highest precedence)
//! 1. Built-in defaults
//! 2. YAML configuration file
//! 3. `GARDENHOSE_*` environment variables (`__` separates sections)
//! 4. Command-line overrides
//!
//! The resulting [`GardenhoseConfig`] is constructed once at startup and
//! handed to each component by reference.

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod credentials;
mod error;
mod filter;
mod stream;
mod telemetry;
mod validation;
mod workers;

pub use credentials::{ClassifierConfig, Secret, TwitterCredentials};
pub use error::ConfigError;
pub use filter::{FilterConfig, GeoBox};
pub use stream::StreamConfig;
pub use telemetry::TelemetryConfig;
pub use workers::{ShutdownConfig, WorkersConfig};

/// Location used when no `--config` path is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gardenhose/gardenhose.yaml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "GARDENHOSE_";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct GardenhoseConfig {
    #[validate(nested)]
    #[serde(default)]
    pub filter: FilterConfig,

    #[validate(nested)]
    #[serde(default)]
    pub twitter: TwitterCredentials,

    #[validate(nested)]
    #[serde(default)]
    pub stream: StreamConfig,

    #[validate(nested)]
    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[validate(nested)]
    #[serde(default)]
    pub workers: WorkersConfig,

    #[validate(nested)]
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl GardenhoseConfig {
    /// Picks the configuration file to read.
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_CONFIG_PATH`] is
    /// used if present and skipped otherwise.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
        match explicit {
            Some(path) if path.exists() => Ok(Some(path.to_path_buf())),
            Some(path) => Err(ConfigError::FileNotFound(path.to_path_buf())),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                Ok(default.exists().then(|| default.to_path_buf()))
            }
        }
    }

    /// Load configuration through every layer and validate the result.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(GardenhoseConfig::default()));

        if let Some(file) = Self::resolve_path(path)? {
            figment = figment.merge(Yaml::file(file));
        }

        Self::extract(
            figment
                .merge(Env::prefixed(ENV_PREFIX).split("__"))
                .merge(Serialized::defaults(overrides)),
        )
    }

    /// Load configuration from a specific path for testing/validation.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        Self::extract(
            Figment::from(Serialized::defaults(GardenhoseConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Ensure both upstream services can be authenticated against.
    ///
    /// Defaults carry empty credentials so they stay valid on their own;
    /// this check runs before the pipeline starts.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        let required = [
            ("twitter.consumer_key", &self.twitter.consumer_key),
            ("twitter.consumer_secret", &self.twitter.consumer_secret),
            ("twitter.access_token_key", &self.twitter.access_token_key),
            ("twitter.access_token_secret", &self.twitter.access_token_secret),
            ("classifier.key", &self.classifier.key),
            ("classifier.secret", &self.classifier.secret),
        ];
        match required.iter().find(|(_, secret)| secret.is_empty()) {
            Some((name, _)) => Err(ConfigError::MissingCredential(*name)),
            None => Ok(()),
        }
    }
}

/// Highest-precedence layer, typically filled from command-line flags.
///
/// Unset fields are not serialized, so they leave lower layers untouched.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConfigOverrides {
    pub filter: FilterOverrides,
    pub twitter: TwitterOverrides,
    pub classifier: ClassifierOverrides,
    pub workers: WorkersOverrides,
    pub telemetry: TelemetryOverrides,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct FilterOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<GeoBox>>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct TwitterOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer_key: Option<Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer_secret: Option<Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_key: Option<Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_secret: Option<Secret>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ClassifierOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct WorkersOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tpc: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<bool>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct TelemetryOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<u8>,
}
