//! Resolves which track a model was trained or evaluated on.
//!
//! The training and evaluation jobs leave a `training_params*.yaml` or
//! `eval_params*.yaml` file next to the model. Several may exist under one
//! prefix, so the file that mentions the metrics file being reported on is
//! the one that counts. Its `WORLD_NAME` names the track.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::EnrichmentError;
use crate::service::RacingService;
use crate::store::ArtifactStore;
use crate::types::{ModelRef, TrackDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Training,
    Evaluation,
}

impl TrackSource {
    pub fn params_file_prefix(self) -> &'static str {
        match self {
            TrackSource::Training => "training_params",
            TrackSource::Evaluation => "eval_params",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    /// The internal track name, which is also what leaderboards are keyed by.
    pub world_name: String,
    pub descriptor: TrackDescriptor,
}

pub struct TrackResolver {
    store: Arc<dyn ArtifactStore>,
    racing: Arc<dyn RacingService>,
    region: String,
}

impl TrackResolver {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        racing: Arc<dyn RacingService>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            store,
            racing,
            region: region.into(),
        }
    }

    pub fn track_arn(&self, world_name: &str) -> String {
        format!("arn:aws:deepracer:{}::track/{world_name}", self.region)
    }

    /// Finds the world name, then the track it names.
    pub async fn resolve_track(
        &self,
        model: &ModelRef,
        source: TrackSource,
        metrics_file_key: &str,
    ) -> Result<ResolvedTrack, EnrichmentError> {
        let world_name = self.find_world_name(model, source, metrics_file_key).await?;
        let descriptor = self.describe_track(&world_name).await?;
        Ok(ResolvedTrack {
            world_name,
            descriptor,
        })
    }

    /// The `WORLD_NAME` of the parameter file that mentions `metrics_file_key`.
    #[instrument(skip_all, fields(bucket = model.bucket(), key_prefix = model.key_prefix(), ?source))]
    pub async fn find_world_name(
        &self,
        model: &ModelRef,
        source: TrackSource,
        metrics_file_key: &str,
    ) -> Result<String, EnrichmentError> {
        let params_prefix = source.params_file_prefix();
        let metrics_file = file_name(metrics_file_key);
        let objects = self
            .store
            .list(model.bucket(), &model.dir_prefix())
            .await?;

        for object in &objects {
            let name = file_name(&object.key);
            if !(name.starts_with(params_prefix) && name.ends_with(".yaml")) {
                continue;
            }
            let contents = self.store.get_text(model.bucket(), &object.key).await?;
            if !contents.contains(metrics_file) {
                debug!(key = %object.key, "Parameter file does not mention `{metrics_file}`");
                continue;
            }
            return world_name_from_params(&object.key, &contents);
        }

        Err(EnrichmentError::NoMatchingParams {
            params_prefix,
            key_prefix: model.key_prefix().to_string(),
            metrics_file: metrics_file.to_string(),
        })
    }

    /// Fetches the track named `world_name` from the racing service.
    pub async fn describe_track(
        &self,
        world_name: &str,
    ) -> Result<TrackDescriptor, EnrichmentError> {
        let track_arn = self.track_arn(world_name);
        debug!(%track_arn, "Looking up track");
        let record = self
            .racing
            .get_track(&track_arn)
            .await?
            .ok_or(EnrichmentError::TrackNotFound { track_arn })?;
        Ok(TrackDescriptor::from_track_record(&record))
    }
}

/// The last `/`-separated segment of `key`.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn world_name_from_params(key: &str, contents: &str) -> Result<String, EnrichmentError> {
    let params: serde_yaml::Value =
        serde_yaml::from_str(contents).map_err(|e| EnrichmentError::InvalidYaml {
            key: key.to_string(),
            message: e.to_string(),
        })?;
    params
        .get("WORLD_NAME")
        .and_then(serde_yaml::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| EnrichmentError::MissingWorldName {
            key: key.to_string(),
        })
}
