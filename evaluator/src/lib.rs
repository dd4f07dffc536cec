//! Aggregates the training and evaluation telemetry of a racing model.
//!
//! Artifacts are read from an object store ([`ArtifactStore`]) and
//! cross-referenced with the racing service ([`RacingService`]). Both are
//! injected through [`Clients`], so tests can substitute them.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use racing_client::RacingClient;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod error;
pub mod export;
pub mod helpers;
pub mod leaderboard;
pub mod metrics;
pub mod poll;
pub mod projection;
pub mod report;
pub mod service;
pub mod store;
pub mod track;
pub mod types;

pub use config::EvaluatorConfig;
pub use error::{
    ConfigError, EnrichmentError, EvaluatorError, ExportError, LeaderboardError, MetricsError,
    StoreError,
};
pub use export::{EnsuredModel, ModelExporter};
pub use leaderboard::{LeaderboardLookup, LookupOutcome};
pub use metrics::MetricsExtractor;
pub use poll::{PollOutcome, PollPolicy, PollStop, Scheduler, TokioScheduler};
pub use report::ReportBuilder;
pub use service::{ExportRequest, RacingService};
pub use store::{ArtifactStore, ObjectStoreArtifactStore, StoredObject};
pub use track::{ResolvedTrack, TrackResolver, TrackSource};
pub use types::{
    EvaluationReport, LeaderboardEntry, MaybeUnknown, MetricRecord, ModelRef, ModelSummary,
    TrackDescriptor, TrainingReport,
};

use helpers::write_output;

#[derive(clap::ValueEnum, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[clap(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Jsonl,
    #[default]
    Pretty,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the evaluator config (TOML). Defaults are used when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, default_value = "pretty", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ModelLocation {
    /// Bucket holding the model's artifacts.
    #[arg(long)]
    pub bucket: String,

    /// Prefix under which the model's artifacts live.
    #[arg(long)]
    pub model_prefix: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluation metrics, track, and the best lap by other racers.
    EvaluationReport(ModelLocation),

    /// Evaluation-phase metrics of the training run and the training track.
    TrainingReport(ModelLocation),

    /// Everything known about a model: reward function, hyperparameters,
    /// metadata, and both reports.
    Summary(ModelLocation),

    /// Make sure a model's artifacts are in a bucket, exporting them if needed.
    EnsureModel {
        #[arg(long)]
        model_name: String,

        #[arg(long)]
        bucket: String,

        /// Role the racing service assumes to write into `bucket`.
        #[arg(long)]
        role_arn: String,

        /// Overrides `export.max_wait_s`.
        #[arg(long)]
        max_wait_s: Option<u64>,
    },

    /// Delete every object whose key starts with a prefix.
    DeletePrefix {
        #[arg(long)]
        bucket: String,

        #[arg(long)]
        prefix: String,
    },
}

/// Handles to the external collaborators.
#[derive(Clone)]
pub struct Clients {
    pub store: Arc<dyn ArtifactStore>,
    pub racing: Arc<dyn RacingService>,
}

impl Clients {
    /// S3 stores and a racing client configured from `config` and the AWS environment.
    pub async fn from_config(config: &EvaluatorConfig) -> Result<Self, EvaluatorError> {
        let mut builder = RacingClient::builder()
            .region(config.racing.region.clone())
            .timeout(config.racing.timeout());
        if let Some(endpoint) = &config.racing.endpoint {
            builder = builder.endpoint(endpoint.clone());
        }
        let racing = builder.build().await?;
        Ok(Self {
            store: Arc::new(ObjectStoreArtifactStore::new(config.storage.clone())),
            racing: Arc::new(racing),
        })
    }
}

/// Entry point of the library: report builders and model export wired to one set of clients.
pub struct Evaluator {
    store: Arc<dyn ArtifactStore>,
    reports: ReportBuilder,
    exporter: ModelExporter,
}

impl Evaluator {
    pub fn new(clients: Clients, config: &EvaluatorConfig) -> Self {
        Self::with_scheduler(clients, config, Arc::new(TokioScheduler))
    }

    pub fn with_scheduler(
        clients: Clients,
        config: &EvaluatorConfig,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let Clients { store, racing } = clients;
        let tracks = TrackResolver::new(store.clone(), racing.clone(), config.racing.region.clone());
        let leaderboards = LeaderboardLookup::new(racing.clone(), &config.leaderboard);
        let metrics = MetricsExtractor::new(store.clone(), tracks, leaderboards);
        Self {
            reports: ReportBuilder::new(store.clone(), metrics),
            exporter: ModelExporter::new(store.clone(), racing, scheduler, &config.export),
            store,
        }
    }

    pub fn reports(&self) -> &ReportBuilder {
        &self.reports
    }

    pub fn exporter(&self) -> &ModelExporter {
        &self.exporter
    }

    pub async fn build_evaluation_report(&self, bucket: &str, key_prefix: &str) -> EvaluationReport {
        self.reports
            .build_evaluation_report(&ModelRef::new(bucket, key_prefix))
            .await
    }

    pub async fn build_training_report(&self, bucket: &str, key_prefix: &str) -> TrainingReport {
        self.reports
            .build_training_report(&ModelRef::new(bucket, key_prefix))
            .await
    }

    pub async fn build_model_summary(&self, bucket: &str, key_prefix: &str) -> ModelSummary {
        self.reports
            .build_model_summary(&ModelRef::new(bucket, key_prefix))
            .await
    }

    pub async fn ensure_model_in_bucket(
        &self,
        model_name: &str,
        target_bucket: &str,
        role_arn: &str,
        cancel: &CancellationToken,
    ) -> Result<EnsuredModel, ExportError> {
        self.exporter
            .ensure_model_in_bucket(model_name, target_bucket, role_arn, cancel)
            .await
    }

    pub async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<usize, StoreError> {
        self.store.delete_by_prefix(bucket, prefix).await
    }
}

#[derive(Debug, Serialize)]
struct EnsureModelOutput<'a> {
    key_prefix: &'a str,
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_status: Option<&'a str>,
    converged: bool,
}

impl<'a> From<&'a EnsuredModel> for EnsureModelOutput<'a> {
    fn from(ensured: &'a EnsuredModel) -> Self {
        match ensured {
            EnsuredModel::Cached { key_prefix } => Self {
                key_prefix,
                cached: true,
                last_status: None,
                converged: true,
            },
            EnsuredModel::Exported { key_prefix, poll } => Self {
                key_prefix,
                cached: false,
                last_status: Some(&poll.last_status),
                converged: poll.converged(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct DeletePrefixOutput<'a> {
    bucket: &'a str,
    prefix: &'a str,
    deleted: usize,
}

/// Loads the config, connects to the real collaborators and runs `args.command`.
pub async fn run<W: Write>(
    args: Args,
    cancel: CancellationToken,
    writer: &mut W,
) -> Result<(), EvaluatorError> {
    let config = EvaluatorConfig::load_optional(args.config.as_deref())?;
    let clients = Clients::from_config(&config).await?;
    let evaluator = Evaluator::new(clients, &config);
    run_command(&evaluator, args.command, &args.format, &cancel, writer).await
}

pub async fn run_command<W: Write>(
    evaluator: &Evaluator,
    command: Command,
    format: &OutputFormat,
    cancel: &CancellationToken,
    writer: &mut W,
) -> Result<(), EvaluatorError> {
    match command {
        Command::EvaluationReport(location) => {
            let report = evaluator
                .build_evaluation_report(&location.bucket, &location.model_prefix)
                .await;
            write_output(writer, &report, format)
        }
        Command::TrainingReport(location) => {
            let report = evaluator
                .build_training_report(&location.bucket, &location.model_prefix)
                .await;
            write_output(writer, &report, format)
        }
        Command::Summary(location) => {
            let summary = evaluator
                .build_model_summary(&location.bucket, &location.model_prefix)
                .await;
            write_output(writer, &summary, format)
        }
        Command::EnsureModel {
            model_name,
            bucket,
            role_arn,
            max_wait_s,
        } => {
            let ensured = match max_wait_s {
                Some(max_wait_s) => {
                    let policy = PollPolicy {
                        max_wait: Duration::from_secs(max_wait_s),
                        ..evaluator.exporter.poll_policy()
                    };
                    evaluator
                        .exporter
                        .ensure_model_in_bucket_with(policy, &model_name, &bucket, &role_arn, cancel)
                        .await?
                }
                None => {
                    evaluator
                        .ensure_model_in_bucket(&model_name, &bucket, &role_arn, cancel)
                        .await?
                }
            };
            write_output(writer, &EnsureModelOutput::from(&ensured), format)
        }
        Command::DeletePrefix { bucket, prefix } => {
            let deleted = evaluator.delete_prefix(&bucket, &prefix).await?;
            write_output(
                writer,
                &DeletePrefixOutput {
                    bucket: &bucket,
                    prefix: &prefix,
                    deleted,
                },
                format,
            )
        }
    }
}
