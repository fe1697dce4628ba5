//! Upstream service credentials and endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A credential value that never shows up in `Debug` output.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(***)")
        }
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// OAuth 1.0a credentials for the streaming platform.
#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TwitterCredentials {
    #[serde(default)]
    pub consumer_key: Secret,
    #[serde(default)]
    pub consumer_secret: Secret,
    #[serde(default)]
    pub access_token_key: Secret,
    #[serde(default)]
    pub access_token_secret: Secret,
}

/// Classification service endpoint and credentials.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub key: Secret,

    #[serde(default)]
    pub secret: Secret,

    /// Base URL; `/classify/social` is appended per call.
    #[serde(default = "default_base_url")]
    #[validate(url)]
    pub base_url: String,

    /// Namespace tag attached to every batch, used downstream to route results.
    #[serde(default = "default_namespace")]
    #[validate(length(min = 1))]
    pub namespace: String,
}

fn default_base_url() -> String {
    "https://api.econtext.com/v2".into()
}

fn default_namespace() -> String {
    "econtext.social.twitter.gardenhose".into()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            key: Secret::default(),
            secret: Secret::default(),
            base_url: default_base_url(),
            namespace: default_namespace(),
        }
    }
}
