//! Makes sure a model's artifacts are present in a bucket we own.
//!
//! The bucket acts as a cache keyed by model name. Each export lands in
//! `{model_name}/{unix_seconds}/`, and the newest one is reused.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::ExportConfig;
use crate::error::{ExportError, StoreError};
use crate::poll::{PollOutcome, PollPolicy, Scheduler};
use crate::service::{ExportRequest, RacingService};
use crate::store::ArtifactStore;

#[derive(Debug, Clone, PartialEq)]
pub enum EnsuredModel {
    /// An earlier export was found.
    Cached { key_prefix: String },
    /// A new export was requested. `poll` says whether it finished in time.
    Exported { key_prefix: String, poll: PollOutcome },
}

impl EnsuredModel {
    pub fn key_prefix(&self) -> &str {
        match self {
            EnsuredModel::Cached { key_prefix } | EnsuredModel::Exported { key_prefix, .. } => {
                key_prefix
            }
        }
    }
}

pub struct ModelExporter {
    store: Arc<dyn ArtifactStore>,
    racing: Arc<dyn RacingService>,
    scheduler: Arc<dyn Scheduler>,
    poll: PollPolicy,
    wanted_status: String,
}

impl ModelExporter {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        racing: Arc<dyn RacingService>,
        scheduler: Arc<dyn Scheduler>,
        config: &ExportConfig,
    ) -> Self {
        Self {
            store,
            racing,
            scheduler,
            poll: config.poll_policy(),
            wanted_status: config.wanted_status.clone(),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Returns the prefix under which `model_name` is available in `target_bucket`,
    /// exporting it first when no earlier export exists.
    ///
    /// Concurrent calls for the same model are not coordinated and may both
    /// request an export. Callers that care must serialize them.
    pub async fn ensure_model_in_bucket(
        &self,
        model_name: &str,
        target_bucket: &str,
        role_arn: &str,
        cancel: &CancellationToken,
    ) -> Result<EnsuredModel, ExportError> {
        self.ensure_model_in_bucket_with(self.poll, model_name, target_bucket, role_arn, cancel)
            .await
    }

    /// Like [`ModelExporter::ensure_model_in_bucket`], polling with `poll` instead of the configured policy.
    #[instrument(skip(self, poll, role_arn, cancel))]
    pub async fn ensure_model_in_bucket_with(
        &self,
        poll: PollPolicy,
        model_name: &str,
        target_bucket: &str,
        role_arn: &str,
        cancel: &CancellationToken,
    ) -> Result<EnsuredModel, ExportError> {
        if let Some(key_prefix) = self.find_cached_export(model_name, target_bucket).await? {
            info!(%key_prefix, "Model is already in bucket");
            return Ok(EnsuredModel::Cached { key_prefix });
        }
        self.export_model(poll, model_name, target_bucket, role_arn, cancel)
            .await
    }

    /// The newest export of `model_name` in `bucket`, e.g. `my-model/1700000000`.
    pub async fn find_cached_export(
        &self,
        model_name: &str,
        bucket: &str,
    ) -> Result<Option<String>, StoreError> {
        let folders = self.store.list_common_prefixes(bucket, model_name).await?;
        let Some(folder) = folders
            .into_iter()
            .find(|folder| folder.trim_end_matches('/') == model_name)
        else {
            return Ok(None);
        };
        let exports = self.store.list_common_prefixes(bucket, &folder).await?;
        Ok(newest_export(&exports).map(|timestamp| format!("{folder}{timestamp}")))
    }

    async fn export_model(
        &self,
        poll: PollPolicy,
        model_name: &str,
        target_bucket: &str,
        role_arn: &str,
        cancel: &CancellationToken,
    ) -> Result<EnsuredModel, ExportError> {
        let model_arn = self.model_arn(model_name).await?;
        let key_prefix = format!("{model_name}/{}", Utc::now().timestamp());
        info!(%model_arn, %key_prefix, "Copying model to bucket");
        self.racing
            .request_export(ExportRequest {
                model_arn: model_arn.clone(),
                target_bucket: target_bucket.to_string(),
                target_prefix: key_prefix.clone(),
                role_arn: role_arn.to_string(),
            })
            .await?;

        let racing = &self.racing;
        let model_arn = model_arn.as_str();
        let poll = poll
            .wait_for(
                self.scheduler.as_ref(),
                cancel,
                &self.wanted_status,
                move || racing.get_model_status(model_arn),
            )
            .await?;
        if poll.converged() {
            info!(status = %poll.last_status, "Model export finished");
        } else {
            warn!(
                status = %poll.last_status,
                stop = ?poll.stop,
                "Model export did not reach `{}`",
                self.wanted_status
            );
        }
        Ok(EnsuredModel::Exported { key_prefix, poll })
    }

    async fn model_arn(&self, model_name: &str) -> Result<String, ExportError> {
        let wanted = model_name.trim();
        self.racing
            .list_models()
            .await?
            .into_iter()
            .find(|model| model.model_name.trim() == wanted)
            .map(|model| model.model_arn)
            .ok_or_else(|| ExportError::ModelNotFound {
                model_name: model_name.to_string(),
            })
    }
}

/// The timestamp segment of the newest export folder, compared numerically.
///
/// Folders look like `my-model/1700000000/`. Segments that are not integers are skipped.
pub fn newest_export(export_folders: &[String]) -> Option<&str> {
    export_folders
        .iter()
        .filter_map(|folder| {
            let segment = folder.trim_end_matches('/').rsplit('/').next()?;
            match segment.parse::<u64>() {
                Ok(timestamp) => Some((timestamp, segment)),
                Err(_) => {
                    warn!("Skipping export folder `{folder}` without a timestamp");
                    None
                }
            }
        })
        .max_by_key(|(timestamp, _)| *timestamp)
        .map(|(_, segment)| segment)
}
