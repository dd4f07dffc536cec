//! Racing service API client.
//!
//! This crate provides a typed client for the racing service's JSON 1.1
//! protocol (`AwsSilverstoneCloudService.*` targets). Requests are signed with
//! SigV4 using either fixed credentials or the default AWS credential chain.
//!
//! # Example
//!
//! ```no_run
//! use racing_client::{ListLeaderboardsRequest, RacingClient};
//!
//! # async fn example() -> Result<(), racing_client::RacingError> {
//! let client = RacingClient::builder().region("us-east-1").build().await?;
//!
//! let page = client
//!     .list_leaderboards(&ListLeaderboardsRequest::virtual_league(50, None))
//!     .await?;
//! for leaderboard in page.leaderboards {
//!     println!("{} -> {}", leaderboard.arn, leaderboard.track_arn);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod types;

pub use aws_credential_types::Credentials;
pub use client::{DEFAULT_REGION, RacingClient, RacingClientBuilder, default_endpoint};
pub use error::RacingError;
pub use types::{
    AssetType, ErrorResponse, GetAssetUrlRequest, GetAssetUrlResponse, GetModelRequest,
    GetModelResponse, GetTrackRequest, GetTrackResponse, LeaderboardAccessRole, LeagueType,
    Leaderboard, ListLeaderboardSubmissionsRequest, ListLeaderboardSubmissionsResponse,
    ListLeaderboardsRequest, ListLeaderboardsResponse, ListModelsRequest, ListModelsResponse,
    ListPrivateLeaderboardParticipantsRequest, ListPrivateLeaderboardParticipantsResponse,
    ListTracksRequest, ListTracksResponse, Model, ModelType, RawRecord,
};
