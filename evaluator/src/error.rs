//! Error types for the evaluator.
//!
//! Errors come in two tiers. Enrichment errors ([`EnrichmentError`],
//! [`LeaderboardError`], [`MetricsError`]) are converted to the `"unknown"`
//! sentinel when a report is assembled. Transport errors ([`StoreError`],
//! [`RacingError`], [`ExportError`], [`ConfigError`]) propagate to the caller.

use std::path::PathBuf;

use racing_client::RacingError;
use thiserror::Error;

/// Failures of the object store collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object store error for bucket `{bucket}`: {source}")]
    ObjectStore {
        bucket: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Invalid object key `{key}`: {message}")]
    InvalidKey { key: String, message: String },

    #[error("Object `{key}` in bucket `{bucket}` is not valid UTF-8")]
    NotUtf8 { bucket: String, key: String },

    #[error("Failed to configure object store for bucket `{bucket}`: {message}")]
    Backend { bucket: String, message: String },
}

/// Failures while paginating leaderboards.
#[derive(Error, Debug)]
pub enum LeaderboardError {
    #[error(transparent)]
    Service(#[from] RacingError),

    /// The service handed back a pagination token it had already returned.
    #[error("Leaderboard pagination returned token `{token}` twice (after {pages} pages)")]
    RepeatedPageToken { token: String, pages: usize },
}

/// Failures of an optional enrichment step. Never surfaced past a report.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Service(#[from] RacingError),

    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),

    #[error("No `{params_prefix}*.yaml` file under `{key_prefix}` references `{metrics_file}`")]
    NoMatchingParams {
        params_prefix: &'static str,
        key_prefix: String,
        metrics_file: String,
    },

    #[error("Failed to parse `{key}` as YAML: {message}")]
    InvalidYaml { key: String, message: String },

    #[error("`{key}` has no string `WORLD_NAME` field")]
    MissingWorldName { key: String },

    #[error("Track `{track_arn}` was not found")]
    TrackNotFound { track_arn: String },

    #[error("Failed to parse `{key}` as JSON: {message}")]
    InvalidJson { key: String, message: String },

    #[error("`{key}` is not a JSON object")]
    NotAnObject { key: String },
}

/// Failures locating or reading a metrics document.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No `.json` metrics file under `{prefix}`")]
    NoMetricsFile { prefix: String },

    #[error("Invalid metrics file `{key}`: {message}")]
    InvalidDocument { key: String, message: String },
}

/// Failures while making sure a model is present in a bucket.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Service(#[from] RacingError),

    #[error("Could not find a model named `{model_name}`")]
    ModelNotFound { model_name: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level error of the evaluator entry points.
#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Racing(#[from] RacingError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}
