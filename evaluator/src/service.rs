//! The racing service collaborator.

use std::collections::HashSet;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use racing_client::{
    AssetType, GetAssetUrlRequest, ListLeaderboardsRequest, ListLeaderboardsResponse,
    ListModelsRequest, Model, ModelType, RacingClient, RacingError, RawRecord,
};
use tracing::{debug, warn};

const LIST_MODELS_PAGE_SIZE: u32 = 100;

/// Parameters of an export of model artifacts into a caller-owned bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub model_arn: String,
    pub target_bucket: String,
    pub target_prefix: String,
    pub role_arn: String,
}

/// Operations of the racing service the evaluator depends on.
///
/// `list_leaderboard_submissions` returns submissions in service order, which
/// is best-first. Callers still pick the lowest `Rank` when ranks are present.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RacingService: Send + Sync + 'static {
    async fn list_leaderboards(
        &self,
        max_results: u32,
        next_token: Option<String>,
    ) -> Result<ListLeaderboardsResponse, RacingError>;

    async fn list_leaderboard_submissions(
        &self,
        leaderboard_arn: &str,
    ) -> Result<Vec<RawRecord>, RacingError>;

    /// Returns `None` when the service answers without a track.
    async fn get_track(&self, track_arn: &str) -> Result<Option<RawRecord>, RacingError>;

    /// Lists every reinforcement learning model of the account.
    async fn list_models(&self) -> Result<Vec<Model>, RacingError>;

    async fn get_model_status(&self, model_arn: &str) -> Result<String, RacingError>;

    /// Starts an asynchronous export. Completion is observed through `get_model_status`.
    async fn request_export(&self, request: ExportRequest) -> Result<(), RacingError>;
}

#[async_trait]
impl RacingService for RacingClient {
    async fn list_leaderboards(
        &self,
        max_results: u32,
        next_token: Option<String>,
    ) -> Result<ListLeaderboardsResponse, RacingError> {
        RacingClient::list_leaderboards(
            self,
            &ListLeaderboardsRequest::virtual_league(max_results, next_token),
        )
        .await
    }

    async fn list_leaderboard_submissions(
        &self,
        leaderboard_arn: &str,
    ) -> Result<Vec<RawRecord>, RacingError> {
        Ok(RacingClient::list_leaderboard_submissions(self, leaderboard_arn)
            .await?
            .leaderboard_submissions)
    }

    async fn get_track(&self, track_arn: &str) -> Result<Option<RawRecord>, RacingError> {
        Ok(RacingClient::get_track(self, track_arn).await?.track)
    }

    async fn list_models(&self) -> Result<Vec<Model>, RacingError> {
        let mut models = Vec::new();
        let mut next_token = None;
        let mut seen_tokens = HashSet::new();
        loop {
            let request = ListModelsRequest {
                max_results: LIST_MODELS_PAGE_SIZE,
                model_type: ModelType::ReinforcementLearning,
                next_token: next_token.take(),
            };
            let page = RacingClient::list_models(self, &request).await?;
            debug!(count = page.models.len(), "Fetched model page");
            models.extend(page.models);
            match page.next_token {
                Some(token) if seen_tokens.insert(token.clone()) => next_token = Some(token),
                Some(token) => {
                    warn!("Model listing returned token `{token}` twice; stopping");
                    break;
                }
                None => break,
            }
        }
        Ok(models)
    }

    async fn get_model_status(&self, model_arn: &str) -> Result<String, RacingError> {
        RacingClient::get_model(self, model_arn)
            .await?
            .model
            .status
            .ok_or(RacingError::MissingField {
                operation: "GetModel",
                field: "Status",
            })
    }

    async fn request_export(&self, request: ExportRequest) -> Result<(), RacingError> {
        let request = GetAssetUrlRequest {
            arn: request.model_arn,
            asset_type: AssetType::S3PkgModelLogs,
            model_artifacts_s3_bucket: request.target_bucket,
            model_artifacts_s3_prefix: request.target_prefix,
            role_arn: request.role_arn,
        };
        self.get_asset_url(&request).await?;
        Ok(())
    }
}
