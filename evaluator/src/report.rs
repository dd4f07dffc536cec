use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::instrument;

use crate::error::EnrichmentError;
use crate::metrics::MetricsExtractor;
use crate::projection::MODEL_METADATA_FIELDS;
use crate::store::ArtifactStore;
use crate::types::{
    EvaluationReport, MaybeUnknown, ModelRef, ModelSummary, TRACK_DIFFICULTY_NOTE, TrainingReport,
};

pub const REWARD_FUNCTION_FILE: &str = "reward_function.py";
pub const HYPERPARAMETERS_FILE: &str = "ip/hyperparameters.json";
pub const MODEL_METADATA_FILE: &str = "model/model_metadata.json";

/// Assembles reports from a model's artifacts.
///
/// Report builders never fail. Anything that cannot be read or resolved is
/// logged and reported as `"unknown"`.
pub struct ReportBuilder {
    store: Arc<dyn ArtifactStore>,
    metrics: MetricsExtractor,
}

impl ReportBuilder {
    pub fn new(store: Arc<dyn ArtifactStore>, metrics: MetricsExtractor) -> Self {
        Self { store, metrics }
    }

    pub fn metrics(&self) -> &MetricsExtractor {
        &self.metrics
    }

    /// Evaluation metrics of the model plus the track they were recorded on
    /// and the best lap other racers posted there.
    ///
    /// Either `metrics` is fully populated or the whole report is the degraded
    /// literal. `track` and `fastest_lap_time_by_others` degrade independently.
    #[instrument(skip_all, fields(bucket = model.bucket(), key_prefix = model.key_prefix()))]
    pub async fn build_evaluation_report(&self, model: &ModelRef) -> EvaluationReport {
        self.metrics.extract_evaluation_metrics(model).await
    }

    #[instrument(skip_all, fields(bucket = model.bucket(), key_prefix = model.key_prefix()))]
    pub async fn build_training_report(&self, model: &ModelRef) -> TrainingReport {
        self.metrics.extract_training_metrics(model).await
    }

    /// Source of the reward function the model was trained with.
    pub async fn reward_function(&self, model: &ModelRef) -> Result<String, EnrichmentError> {
        Ok(self
            .store
            .get_text(model.bucket(), &model.key(REWARD_FUNCTION_FILE))
            .await?)
    }

    pub async fn hyperparameters(&self, model: &ModelRef) -> Result<Value, EnrichmentError> {
        self.read_json(model, HYPERPARAMETERS_FILE).await
    }

    /// The action space and sensors the model was built with.
    pub async fn model_metadata(
        &self,
        model: &ModelRef,
    ) -> Result<Map<String, Value>, EnrichmentError> {
        let key = model.key(MODEL_METADATA_FILE);
        match self.read_json(model, MODEL_METADATA_FILE).await? {
            Value::Object(metadata) => Ok(MODEL_METADATA_FIELDS.project(&metadata)),
            _ => Err(EnrichmentError::NotAnObject { key }),
        }
    }

    #[instrument(skip_all, fields(bucket = model.bucket(), key_prefix = model.key_prefix()))]
    pub async fn build_model_summary(&self, model: &ModelRef) -> ModelSummary {
        ModelSummary {
            reward_function: MaybeUnknown::from_result(
                self.reward_function(model).await,
                "reward function",
            ),
            hyperparameters: MaybeUnknown::from_result(
                self.hyperparameters(model).await,
                "hyperparameters",
            ),
            model_metadata: MaybeUnknown::from_result(
                self.model_metadata(model).await,
                "model metadata",
            ),
            training: self.build_training_report(model).await,
            evaluation: self.build_evaluation_report(model).await,
            track_difficulty_note: TRACK_DIFFICULTY_NOTE.to_string(),
        }
    }

    async fn read_json(&self, model: &ModelRef, relative: &str) -> Result<Value, EnrichmentError> {
        let key = model.key(relative);
        let text = self.store.get_text(model.bucket(), &key).await?;
        serde_json::from_str(&text).map_err(|e| EnrichmentError::InvalidJson {
            key,
            message: e.to_string(),
        })
    }
}
