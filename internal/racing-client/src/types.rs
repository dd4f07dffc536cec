//! Wire types for the racing service JSON protocol.
//!
//! Field names follow the service's `PascalCase` convention. Records whose
//! schema we do not own (tracks, submissions, participants) are kept as raw
//! JSON objects so callers can project them onto the fields they need.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A raw JSON object as returned by the service.
pub type RawRecord = Map<String, Value>;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    ReinforcementLearning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeagueType {
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaderboardAccessRole {
    Admin,
    Participant,
    Moderator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    /// Packaged model plus training logs, copied into a caller-owned bucket.
    S3PkgModelLogs,
}

// =============================================================================
// Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListModelsRequest {
    pub max_results: u32,
    pub model_type: ModelType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<Model>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Model {
    pub model_arn: String,
    pub model_name: String,
    /// e.g. `READY`, `CREATED`, `TRAINING`, `STOPPING`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetModelRequest {
    pub model_arn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetModelResponse {
    pub model: Model,
}

/// Asks the service to export a model's artifacts into a caller-owned bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetAssetUrlRequest {
    pub arn: String,
    pub asset_type: AssetType,
    pub model_artifacts_s3_bucket: String,
    pub model_artifacts_s3_prefix: String,
    pub role_arn: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetAssetUrlResponse {
    #[serde(default)]
    pub url: Option<String>,
}

// =============================================================================
// Tracks
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetTrackRequest {
    pub track_arn: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetTrackResponse {
    #[serde(default)]
    pub track: Option<RawRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListTracksRequest {
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListTracksResponse {
    #[serde(default)]
    pub tracks: Vec<RawRecord>,
    #[serde(default)]
    pub next_token: Option<String>,
}

// =============================================================================
// Leaderboards
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListLeaderboardsRequest {
    pub max_results: u32,
    pub league_type: LeagueType,
    pub leaderboard_access_roles: Vec<LeaderboardAccessRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl ListLeaderboardsRequest {
    /// Virtual-league leaderboards visible to any role, starting at `next_token`.
    pub fn virtual_league(max_results: u32, next_token: Option<String>) -> Self {
        Self {
            max_results,
            league_type: LeagueType::Virtual,
            leaderboard_access_roles: vec![
                LeaderboardAccessRole::Admin,
                LeaderboardAccessRole::Participant,
                LeaderboardAccessRole::Moderator,
            ],
            next_token,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListLeaderboardsResponse {
    #[serde(default)]
    pub leaderboards: Vec<Leaderboard>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Leaderboard {
    pub arn: String,
    #[serde(default)]
    pub track_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListLeaderboardSubmissionsRequest {
    pub leaderboard_arn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListLeaderboardSubmissionsResponse {
    #[serde(default)]
    pub leaderboard_submissions: Vec<RawRecord>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListPrivateLeaderboardParticipantsRequest {
    pub max_results: u32,
    pub leaderboard_arn: String,
    pub leaderboard_access_roles: Vec<LeaderboardAccessRole>,
    pub include_extended_user_data: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListPrivateLeaderboardParticipantsResponse {
    #[serde(default)]
    pub participants: Vec<RawRecord>,
    #[serde(default)]
    pub next_token: Option<String>,
}

// =============================================================================
// Errors
// =============================================================================

/// Error body of the AWS JSON 1.1 protocol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "__type", default)]
    pub error_type: Option<String>,
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    /// The error code without the optional `namespace#` qualifier.
    pub fn short_error_type(&self) -> Option<&str> {
        self.error_type
            .as_deref()
            .map(|t| t.rsplit_once('#').map_or(t, |(_, code)| code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_leaderboards_request_wire_format() {
        let request = ListLeaderboardsRequest::virtual_league(50, None);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "MaxResults": 50,
                "LeagueType": "VIRTUAL",
                "LeaderboardAccessRoles": ["ADMIN", "PARTICIPANT", "MODERATOR"],
            })
        );

        let request = ListLeaderboardsRequest::virtual_league(50, Some("abc".to_string()));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["NextToken"], "abc");
    }

    #[test]
    fn test_get_asset_url_request_wire_format() {
        let request = GetAssetUrlRequest {
            arn: "arn:model".to_string(),
            asset_type: AssetType::S3PkgModelLogs,
            model_artifacts_s3_bucket: "bucket".to_string(),
            model_artifacts_s3_prefix: "my-model/1700000000".to_string(),
            role_arn: "arn:role".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "Arn": "arn:model",
                "AssetType": "S3_PKG_MODEL_LOGS",
                "ModelArtifactsS3Bucket": "bucket",
                "ModelArtifactsS3Prefix": "my-model/1700000000",
                "RoleArn": "arn:role",
            })
        );
    }

    #[test]
    fn test_leaderboards_response_tolerates_missing_fields() {
        let response: ListLeaderboardsResponse = serde_json::from_value(json!({
            "Leaderboards": [{"Arn": "arn:lb/1"}]
        }))
        .unwrap();
        assert_eq!(response.leaderboards.len(), 1);
        assert_eq!(response.leaderboards[0].track_arn, "");
        assert!(response.next_token.is_none());

        let response: ListLeaderboardsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.leaderboards.is_empty());
    }

    #[test]
    fn test_error_response_short_type() {
        let error: ErrorResponse = serde_json::from_value(json!({
            "__type": "com.amazonaws.deepracer#ValidationException",
            "Message": "bad input"
        }))
        .unwrap();
        assert_eq!(error.short_error_type(), Some("ValidationException"));
        assert_eq!(error.message.as_deref(), Some("bad input"));

        let error: ErrorResponse = serde_json::from_value(json!({
            "__type": "AccessDeniedException",
            "message": "nope"
        }))
        .unwrap();
        assert_eq!(error.short_error_type(), Some("AccessDeniedException"));
        assert_eq!(error.message.as_deref(), Some("nope"));
    }
}
