//! Long-lived filtered stream over HTTP with reconnect and back-off.

use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use gardenhose_config::{StreamConfig, TwitterCredentials};
use reqwest::blocking::{Client, Response};
use reqwest::header::AUTHORIZATION;
use tracing::{debug, info, instrument, warn};

use crate::message::{parse_line, Notice, StreamMessage};
use crate::oauth::OAuth1;
use crate::{StreamError, StreamFilter, StreamListener, StreamSource};

/// Slice used when sleeping so that `terminate` is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Reconnect delays.
///
/// Network errors back off linearly, HTTP errors exponentially, and rate
/// limiting starts from a longer floor.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub network_step: Duration,
    pub network_max: Duration,
    pub http_start: Duration,
    pub http_max: Duration,
    pub rate_limit_start: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            network_step: Duration::from_millis(250),
            network_max: Duration::from_secs(16),
            http_start: Duration::from_secs(5),
            http_max: Duration::from_secs(320),
            rate_limit_start: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Backoff {
    policy: BackoffPolicy,
    network: Duration,
    http: Duration,
}

impl Backoff {
    fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            network: Duration::ZERO,
            http: Duration::ZERO,
        }
    }

    fn next_network(&mut self) -> Duration {
        self.network = (self.network + self.policy.network_step).min(self.policy.network_max);
        self.network
    }

    fn next_http(&mut self) -> Duration {
        self.http = if self.http.is_zero() {
            self.policy.http_start
        } else {
            (self.http * 2).min(self.policy.http_max)
        };
        self.http
    }

    fn next_rate_limited(&mut self) -> Duration {
        self.http = if self.http < self.policy.rate_limit_start {
            self.policy.rate_limit_start
        } else {
            (self.http * 2).min(self.policy.http_max)
        };
        self.http
    }

    fn reset(&mut self) {
        self.network = Duration::ZERO;
        self.http = Duration::ZERO;
    }
}

/// Statuses that reconnecting cannot fix.
fn is_fatal_status(status: u16) -> bool {
    matches!(status, 401 | 403 | 404 | 406 | 413 | 416)
}

fn is_rate_limit_status(status: u16) -> bool {
    matches!(status, 420 | 429)
}

/// Sleeps for `duration`, returning early with `true` if `terminate` is set.
fn sleep_observing(duration: Duration, terminate: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if terminate.load(Ordering::Relaxed) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

/// HTTP stream source signed with OAuth 1.0a.
pub struct FilterStream {
    http: Client,
    endpoint: String,
    oauth: OAuth1,
    max_retries: Option<u32>,
    backoff: BackoffPolicy,
}

impl FilterStream {
    /// Must not be called from inside an async runtime context.
    pub fn new(config: &StreamConfig, creds: &TwitterCredentials) -> Result<Self, StreamError> {
        let http = Client::builder()
            .timeout(None::<Duration>)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("gardenhose/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            oauth: OAuth1::from_credentials(creds),
            max_retries: config.max_retries,
            backoff: BackoffPolicy::default(),
        })
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    fn connect(&self, params: &[(String, String)]) -> Result<Response, StreamError> {
        let authorization = self.oauth.authorization("POST", &self.endpoint, params)?;
        Ok(self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, authorization)
            .form(params)
            .send()?)
    }

    /// Reads messages until the connection drops or `terminate` is set.
    ///
    /// Returns `Ok(())` only on termination.
    fn consume(
        &self,
        response: Response,
        listener: &dyn StreamListener,
        terminate: &AtomicBool,
    ) -> Result<(), StreamError> {
        for line in BufReader::new(response).lines() {
            if terminate.load(Ordering::Relaxed) {
                return Ok(());
            }
            match parse_line(&line?) {
                Ok(Some(StreamMessage::Status(post))) => listener.on_post(post),
                Ok(Some(StreamMessage::Notice(notice))) => {
                    listener.on_notice(&notice);
                    if let Notice::Disconnect { code, reason } = notice {
                        return Err(StreamError::Disconnected { code, reason });
                    }
                }
                Ok(None) => {}
                Err(e) => listener.on_error(&StreamError::Decode(e)),
            }
        }

        if terminate.load(Ordering::Relaxed) {
            return Ok(());
        }
        Err(StreamError::Disconnected {
            code: None,
            reason: "stream closed by server".into(),
        })
    }
}

impl StreamSource for FilterStream {
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    fn filter(
        &mut self,
        filter: &StreamFilter,
        listener: &dyn StreamListener,
        terminate: &AtomicBool,
    ) -> Result<(), StreamError> {
        let params = filter.form_params();
        let mut backoff = Backoff::new(self.backoff.clone());
        let mut attempts: u32 = 0;

        loop {
            if terminate.load(Ordering::Relaxed) {
                return Ok(());
            }

            debug!(?params, "connecting to filtered stream");
            let wait = match self.connect(&params) {
                Ok(response) if response.status().is_success() => {
                    info!("connected to filtered stream");
                    attempts = 0;
                    backoff.reset();
                    match self.consume(response, listener, terminate) {
                        Ok(()) => return Ok(()),
                        Err(e) => {
                            listener.on_error(&e);
                            backoff.next_network()
                        }
                    }
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    listener.on_error(&StreamError::Status { status });
                    if is_fatal_status(status) {
                        return Err(StreamError::Rejected { status });
                    }
                    if is_rate_limit_status(status) {
                        backoff.next_rate_limited()
                    } else {
                        backoff.next_http()
                    }
                }
                Err(e) => {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    listener.on_error(&e);
                    backoff.next_network()
                }
            };

            attempts += 1;
            if let Some(max) = self.max_retries {
                if attempts > max {
                    return Err(StreamError::RetriesExhausted { attempts });
                }
            }

            warn!(attempts, wait = ?wait, "reconnecting to filtered stream");
            if sleep_observing(wait, terminate) {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnListener;
    use gardenhose_config::{FilterConfig, Secret};
    use gardenhose_core::Post;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_backoff() -> BackoffPolicy {
        BackoffPolicy {
            network_step: Duration::from_millis(1),
            network_max: Duration::from_millis(5),
            http_start: Duration::from_millis(1),
            http_max: Duration::from_millis(5),
            rate_limit_start: Duration::from_millis(2),
        }
    }

    fn credentials() -> TwitterCredentials {
        TwitterCredentials {
            consumer_key: Secret::new("ck"),
            consumer_secret: Secret::new("cs"),
            access_token_key: Secret::new("ak"),
            access_token_secret: Secret::new("as"),
        }
    }

    #[derive(Default)]
    struct Recorded {
        posts: Mutex<Vec<Post>>,
        errors: Mutex<Vec<String>>,
    }

    async fn run_stream(
        server: &MockServer,
        max_retries: Option<u32>,
        terminate: bool,
    ) -> (Result<(), StreamError>, Arc<Recorded>) {
        let endpoint = format!("{}/1.1/statuses/filter.json", server.uri());
        let recorded = Arc::new(Recorded::default());
        let sink = recorded.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<(), StreamError> {
            let config = StreamConfig {
                endpoint,
                max_retries,
                connect_timeout_secs: 5,
            };
            let mut stream = FilterStream::new(&config, &credentials())?.with_backoff(fast_backoff());
            let filter = StreamFilter::from_config(&FilterConfig {
                words: vec!["rust".into()],
                languages: vec!["en".into()],
                locations: vec![],
            })?;
            let errors = sink.clone();
            let listener = FnListener::new(
                move |post| sink.posts.lock().push(post),
                move |e: &StreamError| errors.errors.lock().push(e.to_string()),
            );
            stream.filter(&filter, &listener, &AtomicBool::new(terminate))
        })
        .await
        .unwrap();
        (result, recorded)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delivers_posts_and_reports_bad_lines() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"id_str\":\"1\",\"text\":\"hello\",\"lang\":\"en\"}\r\n",
            "\r\n",
            "{\"delete\":{\"status\":{\"id_str\":\"9\"}}}\r\n",
            "{broken\r\n",
            "{\"id_str\":\"2\",\"text\":\"cut…\",\"extended_tweet\":{\"full_text\":\"full text\"}}\r\n",
        );
        Mock::given(method("POST"))
            .and(path("/1.1/statuses/filter.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("track=rust"))
            .and(body_string_contains("language=en"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let (result, recorded) = run_stream(&server, Some(0), false).await;

        assert!(matches!(result, Err(StreamError::RetriesExhausted { attempts: 1 })));
        let texts: Vec<String> = recorded.posts.lock().iter().map(|p| p.text.clone()).collect();
        assert_eq!(texts, vec!["hello", "full text"]);
        let errors = recorded.errors.lock();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("Undecodable stream message"));
        assert!(errors[1].contains("stream closed by server"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unauthorized_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (result, recorded) = run_stream(&server, None, false).await;

        assert!(matches!(result, Err(StreamError::Rejected { status: 401 })));
        assert!(recorded.posts.lock().is_empty());
        assert_eq!(recorded.errors.lock().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_errors_are_retried_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let (result, recorded) = run_stream(&server, Some(2), false).await;

        assert!(matches!(result, Err(StreamError::RetriesExhausted { attempts: 3 })));
        assert_eq!(recorded.errors.lock().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn terminate_stops_before_connecting() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (result, _) = run_stream(&server, None, true).await;
        assert!(result.is_ok());
    }

    #[test]
    fn backoff_sequences_follow_policy() {
        let mut backoff = Backoff::new(BackoffPolicy::default());
        assert_eq!(backoff.next_network(), Duration::from_millis(250));
        assert_eq!(backoff.next_network(), Duration::from_millis(500));

        assert_eq!(backoff.next_http(), Duration::from_secs(5));
        assert_eq!(backoff.next_http(), Duration::from_secs(10));
        assert_eq!(backoff.next_rate_limited(), Duration::from_secs(60));
        assert_eq!(backoff.next_rate_limited(), Duration::from_secs(120));

        for _ in 0..64 {
            backoff.next_http();
            backoff.next_network();
        }
        assert_eq!(backoff.http, Duration::from_secs(320));
        assert_eq!(backoff.network, Duration::from_secs(16));

        backoff.reset();
        assert_eq!(backoff.next_http(), Duration::from_secs(5));
        assert_eq!(backoff.next_network(), Duration::from_millis(250));
    }

    #[test]
    fn network_backoff_reaches_cap_after_step_count() {
        let policy = BackoffPolicy::default();
        let steps = (policy.network_max.as_millis() / policy.network_step.as_millis()) as usize;
        let mut backoff = Backoff::new(policy);
        for _ in 0..steps - 1 {
            assert!(backoff.next_network() < Duration::from_secs(16));
        }
        assert_eq!(backoff.next_network(), Duration::from_secs(16));
        assert_eq!(backoff.next_network(), Duration::from_secs(16));
    }

    #[test]
    fn sleep_returns_early_on_terminate() {
        let terminate = AtomicBool::new(true);
        let started = Instant::now();
        assert!(sleep_observing(Duration::from_secs(10), &terminate));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
