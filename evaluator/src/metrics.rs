//! Reads a model's training and evaluation metrics.
//!
//! The simulation writes one JSON document per job under
//! `{prefix}/metrics/training` or `{prefix}/metrics/evaluation`. Each document
//! has a `metrics` array with one entry per episode (training documents also
//! carry training-phase entries, which are dropped). Only the first `.json`
//! document in key order is read.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::MetricsError;
use crate::leaderboard::{LeaderboardLookup, LookupOutcome};
use crate::projection::{EVALUATION_METRIC_FIELDS, TRAINING_METRIC_FIELDS};
use crate::store::ArtifactStore;
use crate::track::{TrackResolver, TrackSource};
use crate::types::{EvaluationReport, MaybeUnknown, MetricRecord, ModelRef, TrainingReport};

pub const TRAINING_METRICS_DIR: &str = "metrics/training";
pub const EVALUATION_METRICS_DIR: &str = "metrics/evaluation";

/// The projected records of one metrics document.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsFile {
    pub key: String,
    pub records: Vec<MetricRecord>,
}

pub struct MetricsExtractor {
    store: Arc<dyn ArtifactStore>,
    tracks: TrackResolver,
    leaderboards: LeaderboardLookup,
}

impl MetricsExtractor {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        tracks: TrackResolver,
        leaderboards: LeaderboardLookup,
    ) -> Self {
        Self {
            store,
            tracks,
            leaderboards,
        }
    }

    /// Evaluation-phase records of the training run, one per episode.
    #[instrument(skip_all, fields(bucket = model.bucket(), key_prefix = model.key_prefix()))]
    pub async fn training_metrics(&self, model: &ModelRef) -> Result<MetricsFile, MetricsError> {
        let (key, entries) = self.read_metrics_file(model, TRAINING_METRICS_DIR).await?;
        Ok(MetricsFile {
            key,
            records: collapse_training_entries(&entries),
        })
    }

    #[instrument(skip_all, fields(bucket = model.bucket(), key_prefix = model.key_prefix()))]
    pub async fn evaluation_metrics(&self, model: &ModelRef) -> Result<MetricsFile, MetricsError> {
        let (key, entries) = self
            .read_metrics_file(model, EVALUATION_METRICS_DIR)
            .await?;
        Ok(MetricsFile {
            key,
            records: project_evaluation_entries(&entries),
        })
    }

    pub async fn extract_training_metrics(&self, model: &ModelRef) -> TrainingReport {
        let file = match self.training_metrics(model).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Could not read training metrics for `{}`: {e}", model.key_prefix());
                return TrainingReport::unknown();
            }
        };
        let track = self
            .tracks
            .resolve_track(model, TrackSource::Training, &file.key)
            .await
            .map(|resolved| resolved.descriptor);
        TrainingReport {
            metrics: MaybeUnknown::Known(file.records),
            track: MaybeUnknown::from_result(track, "training track"),
        }
    }

    pub async fn extract_evaluation_metrics(&self, model: &ModelRef) -> EvaluationReport {
        let file = match self.evaluation_metrics(model).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Could not read evaluation metrics for `{}`: {e}", model.key_prefix());
                return EvaluationReport::unknown();
            }
        };
        // Leaderboards are keyed by world name, so the lap time does not depend on the track record.
        let (track, fastest_lap_time_by_others) = match self
            .tracks
            .find_world_name(model, TrackSource::Evaluation, &file.key)
            .await
        {
            Ok(world_name) => (
                self.tracks.describe_track(&world_name).await,
                MaybeUnknown::from_result(
                    self.leaderboards
                        .lookup_best_entry(&world_name)
                        .await
                        .map(LookupOutcome::into_entry),
                    "fastest lap time by others",
                ),
            ),
            Err(e) => (Err(e), MaybeUnknown::Unknown),
        };
        EvaluationReport {
            metrics: MaybeUnknown::Known(file.records),
            track: MaybeUnknown::from_result(track, "evaluation track"),
            fastest_lap_time_by_others,
        }
    }

    async fn read_metrics_file(
        &self,
        model: &ModelRef,
        dir: &str,
    ) -> Result<(String, Vec<Value>), MetricsError> {
        let prefix = model.key(dir);
        let objects = self.store.list(model.bucket(), &prefix).await?;
        let Some(object) = objects.iter().find(|object| object.key.ends_with(".json")) else {
            return Err(MetricsError::NoMetricsFile { prefix });
        };
        debug!(key = %object.key, candidates = objects.len(), "Reading metrics file");
        let text = self.store.get_text(model.bucket(), &object.key).await?;
        let mut document: Value =
            serde_json::from_str(&text).map_err(|e| MetricsError::InvalidDocument {
                key: object.key.clone(),
                message: e.to_string(),
            })?;
        match document.get_mut("metrics").map(Value::take) {
            Some(Value::Array(entries)) => Ok((object.key.clone(), entries)),
            _ => Err(MetricsError::InvalidDocument {
                key: object.key.clone(),
                message: "`metrics` is missing or not an array".to_string(),
            }),
        }
    }
}

/// Keeps evaluation-phase entries, one per episode.
///
/// A later entry for the same episode replaces the earlier one but keeps its position.
pub fn collapse_training_entries(entries: &[Value]) -> Vec<MetricRecord> {
    let mut by_episode: IndexMap<String, MetricRecord> = IndexMap::new();
    for entry in entries {
        let Some(record) = entry.as_object() else {
            continue;
        };
        if record.get("phase").and_then(Value::as_str) != Some("evaluation") {
            continue;
        }
        let Some(episode) = record.get("episode") else {
            continue;
        };
        by_episode.insert(episode_key(episode), TRAINING_METRIC_FIELDS.project(record));
    }
    by_episode.into_values().collect()
}

/// `1` and `1.0` name the same episode.
fn episode_key(episode: &Value) -> String {
    match episode.as_f64() {
        Some(number) => number.to_string(),
        None => episode.to_string(),
    }
}

pub fn project_evaluation_entries(entries: &[Value]) -> Vec<MetricRecord> {
    entries
        .iter()
        .filter_map(Value::as_object)
        .map(|record| EVALUATION_METRIC_FIELDS.project(record))
        .collect()
}
