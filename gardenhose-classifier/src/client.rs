//! HTTP implementation of the classifier.

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use tracing::{debug, info, instrument};

use crate::request::SocialRequest;
use crate::{Classification, ClassifyError, ClassifyTags, Classifier};

const MAX_ERROR_BODY: usize = 512;

/// Classification API client using HTTP basic authentication.
///
/// Calls carry no overall timeout, so a hung call stalls only its worker.
pub struct HttpClassifier {
    http: Client,
    endpoint: String,
    key: String,
    secret: String,
}

impl HttpClassifier {
    /// Builds a client for `{base_url}/classify/social`.
    ///
    /// Must not be called from inside an async runtime context.
    pub fn new(base_url: &str, key: &str, secret: &str) -> Result<Self, ClassifyError> {
        info!("connecting to classification API at {base_url}");
        let http = Client::builder()
            .timeout(None::<Duration>)
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("gardenhose/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/classify/social", base_url.trim_end_matches('/')),
            key: key.to_string(),
            secret: secret.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Classifier for HttpClassifier {
    #[instrument(skip_all, level = "debug", fields(batch_len = texts.len()))]
    fn classify(
        &self,
        texts: &[String],
        tags: &ClassifyTags,
    ) -> Result<Classification, ClassifyError> {
        let started = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.key, Some(&self.secret))
            .json(&SocialRequest::new(texts, tags))
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(ClassifyError::Api {
                status: status.as_u16(),
                body: truncate(body, MAX_ERROR_BODY),
            });
        }

        let mut value: serde_json::Value = serde_json::from_str(&body)?;
        let results = match value
            .pointer_mut("/econtext/results")
            .map(serde_json::Value::take)
        {
            Some(results) => results,
            None => value,
        };
        let duration = started.elapsed();
        debug!(elapsed = ?duration, "classification call returned");

        Ok(Classification { results, duration })
    }
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}
