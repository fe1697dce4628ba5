use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use gardenhose_classifier::HttpClassifier;
use gardenhose_config::{
    ClassifierOverrides, ConfigOverrides, FilterOverrides, GardenhoseConfig, GeoBox, Secret,
    TelemetryOverrides, TwitterOverrides, WorkersOverrides,
};
use gardenhose_engine::{Mapper, RunSummary};
use gardenhose_stream::FilterStream;
use gardenhose_telemetry::{logging, MetricsRecorder};
use tracing::{debug, error, info, warn};

/// Highest level `-v` can request; more flags keep it at trace.
const MAX_VERBOSITY: u8 = 3;

/// Stream filtered posts into the classification service.
#[derive(Parser, Debug)]
#[command(name = "gardenhose", version, about)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(long)]
    pub consumer_key: Option<String>,

    #[arg(long)]
    pub consumer_secret: Option<String>,

    #[arg(long)]
    pub access_token_key: Option<String>,

    #[arg(long)]
    pub access_token_secret: Option<String>,

    #[arg(long)]
    pub econtext_key: Option<String>,

    #[arg(long)]
    pub econtext_secret: Option<String>,

    /// Classification API base URL
    #[arg(long, value_name = "URL")]
    pub econtext_baseurl: Option<String>,

    /// Number of worker threads
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Posts per classification call
    #[arg(long)]
    pub tpc: Option<usize>,

    /// Request sentiment analysis (`--sentiment=false` turns it off)
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub sentiment: Option<bool>,

    /// Comma-separated keywords to track
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub filter_words: Option<Vec<String>>,

    /// Comma-separated language codes
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub filter_languages: Option<Vec<String>>,

    /// Bounding boxes as sw_lon,sw_lat,ne_lon,ne_lat[,...]
    #[arg(long, value_delimiter = ',', num_args = 1.., allow_hyphen_values = true)]
    pub filter_locations: Option<Vec<f64>>,
}

fn trimmed(values: &Option<Vec<String>>) -> Option<Vec<String>> {
    values.as_ref().map(|values| {
        values
            .iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    })
}

fn secret(value: &Option<String>) -> Option<Secret> {
    value.as_deref().map(Secret::new)
}

impl Cli {
    /// Flags that were given, as the highest-precedence config layer.
    pub fn overrides(&self) -> anyhow::Result<ConfigOverrides> {
        let locations = match &self.filter_locations {
            Some(coords) => Some(GeoBox::from_flat(coords).ok_or_else(|| {
                anyhow!(
                    "--filter-locations takes groups of four coordinates, got {}",
                    coords.len()
                )
            })?),
            None => None,
        };

        Ok(ConfigOverrides {
            filter: FilterOverrides {
                words: trimmed(&self.filter_words),
                languages: trimmed(&self.filter_languages),
                locations,
            },
            twitter: TwitterOverrides {
                consumer_key: secret(&self.consumer_key),
                consumer_secret: secret(&self.consumer_secret),
                access_token_key: secret(&self.access_token_key),
                access_token_secret: secret(&self.access_token_secret),
            },
            classifier: ClassifierOverrides {
                key: secret(&self.econtext_key),
                secret: secret(&self.econtext_secret),
                base_url: self.econtext_baseurl.clone(),
            },
            workers: WorkersOverrides {
                threads: self.threads,
                tpc: self.tpc,
                sentiment: self.sentiment,
            },
            telemetry: TelemetryOverrides {
                verbosity: (self.verbose > 0).then_some(self.verbose.min(MAX_VERBOSITY)),
            },
        })
    }
}

/// Loads configuration, runs the pipeline until interrupted, reports the outcome.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let overrides = cli.overrides()?;
    let config = GardenhoseConfig::load(cli.config.as_deref(), &overrides)
        .context("failed to load configuration")?;
    logging::init(config.telemetry.verbosity)
        .map_err(|e| anyhow!("failed to initialise logging: {e}"))?;
    config.require_credentials()?;

    let metrics = Arc::new(MetricsRecorder::new()?);
    let terminate = Arc::new(AtomicBool::new(false));

    let mut pipeline = {
        let metrics = Arc::clone(&metrics);
        let terminate = Arc::clone(&terminate);
        tokio::task::spawn_blocking(move || run_pipeline(config, metrics, &terminate))
    };

    let summary = tokio::select! {
        joined = &mut pipeline => joined?,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Interrupt received, stopping the stream"),
                Err(e) => warn!("cannot listen for interrupts: {e}"),
            }
            terminate.store(true, Ordering::SeqCst);
            pipeline.await?
        }
    }?;

    match metrics.gather_metrics() {
        Ok(text) => debug!("final metrics:\n{text}"),
        Err(e) => warn!("failed to gather metrics: {e}"),
    }
    report(&summary)
}

fn run_pipeline(
    config: GardenhoseConfig,
    metrics: Arc<MetricsRecorder>,
    terminate: &AtomicBool,
) -> anyhow::Result<RunSummary> {
    let classifier = HttpClassifier::new(
        &config.classifier.base_url,
        config.classifier.key.expose(),
        config.classifier.secret.expose(),
    )?;
    let mut stream = FilterStream::new(&config.stream, &config.twitter)?;
    info!(endpoint = classifier.endpoint(), "classifier ready");

    let mapper = Mapper::new(config, Arc::new(classifier), metrics);
    Ok(mapper.run(&mut stream, terminate)?)
}

fn report(summary: &RunSummary) -> anyhow::Result<ExitCode> {
    let shutdown = &summary.shutdown;
    info!(
        classified = summary.classified(),
        dropped = summary.dropped(),
        failed_batches = shutdown.failed_batches(),
        discarded = shutdown.discarded,
        "pipeline stopped"
    );
    if !shutdown.stuck.is_empty() {
        warn!(workers = ?shutdown.stuck, "workers still busy at exit");
    }
    if !shutdown.panicked.is_empty() {
        bail!("worker threads panicked: {:?}", shutdown.panicked);
    }
    match &summary.stream_error {
        Some(e) => {
            error!("exiting after fatal stream error: {e}");
            Ok(ExitCode::FAILURE)
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_means_no_overrides() {
        let cli = Cli::try_parse_from(["gardenhose"]).unwrap();
        let overrides = cli.overrides().unwrap();
        assert!(overrides.filter.words.is_none());
        assert!(overrides.twitter.consumer_key.is_none());
        assert!(overrides.workers.sentiment.is_none());
        assert!(overrides.telemetry.verbosity.is_none());
    }

    #[test]
    fn flags_map_onto_config_sections() {
        let cli = Cli::try_parse_from([
            "gardenhose",
            "--config",
            "/tmp/gh.yaml",
            "-vv",
            "--consumer-key",
            "ck",
            "--econtext-key",
            "ek",
            "--econtext-baseurl",
            "http://localhost:8080/v2",
            "-t",
            "4",
            "--tpc",
            "250",
            "--sentiment",
            "--filter-words",
            "rust, tokio,,serde",
            "--filter-languages",
            "en,es",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/gh.yaml")));

        let overrides = cli.overrides().unwrap();
        assert_eq!(
            overrides.filter.words,
            Some(vec!["rust".into(), "tokio".into(), "serde".into()])
        );
        assert_eq!(overrides.filter.languages, Some(vec!["en".into(), "es".into()]));
        assert_eq!(
            overrides.twitter.consumer_key.as_ref().map(Secret::expose),
            Some("ck")
        );
        assert_eq!(overrides.classifier.key.as_ref().map(Secret::expose), Some("ek"));
        assert_eq!(
            overrides.classifier.base_url.as_deref(),
            Some("http://localhost:8080/v2")
        );
        assert_eq!(overrides.workers.threads, Some(4));
        assert_eq!(overrides.workers.tpc, Some(250));
        assert_eq!(overrides.workers.sentiment, Some(true));
        assert_eq!(overrides.telemetry.verbosity, Some(2));
    }

    #[test]
    fn locations_are_grouped_into_boxes() {
        let cli = Cli::try_parse_from([
            "gardenhose",
            "--filter-locations",
            "-122.75,36.8,-121.75,37.8",
        ])
        .unwrap();
        let boxes = cli.overrides().unwrap().filter.locations.unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].sw_lon, -122.75);
        assert_eq!(boxes[0].ne_lat, 37.8);
    }

    #[test]
    fn incomplete_location_box_is_rejected() {
        let cli =
            Cli::try_parse_from(["gardenhose", "--filter-locations", "1.0,2.0,3.0"]).unwrap();
        let err = cli.overrides().unwrap_err();
        assert!(err.to_string().contains("groups of four"));
    }

    #[test]
    fn repeated_verbose_flags_stay_within_range() {
        let cli = Cli::try_parse_from(["gardenhose", "-vvvvv"]).unwrap();
        assert_eq!(cli.verbose, 5);
        let overrides = cli.overrides().unwrap();
        assert_eq!(overrides.telemetry.verbosity, Some(3));

        let config = GardenhoseConfig::load(None, &overrides).unwrap();
        assert_eq!(config.telemetry.verbosity, 3);
    }

    #[test]
    fn sentiment_can_be_switched_off_explicitly() {
        let cli = Cli::try_parse_from(["gardenhose", "--sentiment=false"]).unwrap();
        assert_eq!(cli.overrides().unwrap().workers.sentiment, Some(false));

        let cli = Cli::try_parse_from(["gardenhose", "--sentiment", "false", "-t", "2"]).unwrap();
        assert_eq!(cli.sentiment, Some(false));
        assert_eq!(cli.threads, Some(2));

        let cli = Cli::try_parse_from(["gardenhose", "--sentiment", "--tpc", "10"]).unwrap();
        assert_eq!(cli.sentiment, Some(true));

        assert!(Cli::try_parse_from(["gardenhose", "--sentiment=maybe"]).is_err());
    }

    #[test]
    fn non_numeric_threads_fail_to_parse() {
        assert!(Cli::try_parse_from(["gardenhose", "--threads", "many"]).is_err());
    }
}
