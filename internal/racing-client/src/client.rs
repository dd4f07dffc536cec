//! Racing service client implementation.

use std::borrow::Cow;
use std::fmt;
use std::time::{Duration, SystemTime};

use aws_config::Region;
use aws_credential_types::Credentials;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningParams, SigningSettings, sign};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::RacingError;
use crate::types::{
    ErrorResponse, GetAssetUrlRequest, GetAssetUrlResponse, GetModelRequest, GetModelResponse,
    GetTrackRequest, GetTrackResponse, LeaderboardAccessRole, ListLeaderboardSubmissionsRequest,
    ListLeaderboardSubmissionsResponse, ListLeaderboardsRequest, ListLeaderboardsResponse,
    ListModelsRequest, ListModelsResponse, ListPrivateLeaderboardParticipantsRequest,
    ListPrivateLeaderboardParticipantsResponse, ListTracksRequest, ListTracksResponse,
};

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// SigV4 signing name of the service.
const SERVICE_NAME: &str = "deepracer";
const TARGET_PREFIX: &str = "AwsSilverstoneCloudService";
const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const AMZ_TARGET_HEADER: &str = "x-amz-target";

/// Returns the public endpoint of the service in `region`.
pub fn default_endpoint(region: &str) -> Result<Url, RacingError> {
    Ok(Url::parse(&format!(
        "https://deepracer-prod.{region}.amazonaws.com/"
    ))?)
}

// =============================================================================
// Client Builder
// =============================================================================

/// Builder for creating a [`RacingClient`].
#[derive(Default)]
pub struct RacingClientBuilder {
    region: Option<String>,
    endpoint: Option<Url>,
    http_client: Option<reqwest::Client>,
    timeout: Option<Duration>,
    credentials: Option<Credentials>,
}

impl RacingClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the region used for signing and for the default endpoint.
    ///
    /// Defaults to `us-east-1`.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Overrides the service endpoint.
    pub fn endpoint(mut self, url: Url) -> Self {
        self.endpoint = Some(url);
        self
    }

    /// Sets a custom HTTP client.
    ///
    /// If not set, a new client will be created.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the timeout for requests. Ignored when a custom HTTP client is set.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Uses fixed credentials instead of the default AWS credential chain.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Builds the [`RacingClient`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The endpoint is not a valid URL with a host
    /// - No credentials provider is available from the environment
    /// - The HTTP client cannot be built
    pub async fn build(self) -> Result<RacingClient, RacingError> {
        let region = self.region.unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = match self.endpoint {
            Some(url) => url,
            None => default_endpoint(&region)?,
        };
        let host = host_header(&endpoint)?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build().map_err(RacingError::Request)?
            }
        };

        let credentials = match self.credentials {
            Some(credentials) => SharedCredentialsProvider::new(credentials),
            None => {
                tracing::trace!("Loading AWS config for region: {region}");
                let config = aws_config::from_env()
                    .region(Region::new(region.clone()))
                    .load()
                    .await;
                config.credentials_provider().ok_or_else(|| {
                    RacingError::Credentials(
                        "no credentials provider found in the environment".to_string(),
                    )
                })?
            }
        };

        Ok(RacingClient {
            http_client,
            endpoint,
            host,
            region,
            credentials,
        })
    }
}

fn host_header(url: &Url) -> Result<String, RacingError> {
    let host = url
        .host_str()
        .ok_or(RacingError::InvalidUrl(url::ParseError::EmptyHost))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

// =============================================================================
// Client
// =============================================================================

/// Client for the racing service (leaderboards, tracks, models).
#[derive(Clone)]
pub struct RacingClient {
    http_client: reqwest::Client,
    endpoint: Url,
    host: String,
    region: String,
    credentials: SharedCredentialsProvider,
}

impl fmt::Debug for RacingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RacingClient")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl RacingClient {
    /// Creates a new builder for constructing a [`RacingClient`].
    pub fn builder() -> RacingClientBuilder {
        RacingClientBuilder::new()
    }

    /// Returns the endpoint requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the signing region.
    pub fn region(&self) -> &str {
        &self.region
    }

    // -------------------------------------------------------------------------
    // Model Operations
    // -------------------------------------------------------------------------

    /// Lists one page of the account's models.
    pub async fn list_models(
        &self,
        request: &ListModelsRequest,
    ) -> Result<ListModelsResponse, RacingError> {
        self.call("ListModels", request).await
    }

    /// Fetches a single model, including its status.
    pub async fn get_model(&self, model_arn: &str) -> Result<GetModelResponse, RacingError> {
        let request = GetModelRequest {
            model_arn: model_arn.to_string(),
        };
        self.call("GetModel", &request).await
    }

    /// Starts exporting a model's artifacts into the bucket/prefix named in `request`.
    pub async fn get_asset_url(
        &self,
        request: &GetAssetUrlRequest,
    ) -> Result<GetAssetUrlResponse, RacingError> {
        self.call("GetAssetUrl", request).await
    }

    // -------------------------------------------------------------------------
    // Track Operations
    // -------------------------------------------------------------------------

    pub async fn get_track(&self, track_arn: &str) -> Result<GetTrackResponse, RacingError> {
        let request = GetTrackRequest {
            track_arn: track_arn.to_string(),
        };
        self.call("GetTrack", &request).await
    }

    pub async fn list_tracks(
        &self,
        request: &ListTracksRequest,
    ) -> Result<ListTracksResponse, RacingError> {
        self.call("ListTracks", request).await
    }

    // -------------------------------------------------------------------------
    // Leaderboard Operations
    // -------------------------------------------------------------------------

    pub async fn list_leaderboards(
        &self,
        request: &ListLeaderboardsRequest,
    ) -> Result<ListLeaderboardsResponse, RacingError> {
        self.call("ListLeaderboards", request).await
    }

    /// Lists the submissions of a leaderboard.
    ///
    /// The service returns submissions ranked best-first and tags each with a `Rank`.
    pub async fn list_leaderboard_submissions(
        &self,
        leaderboard_arn: &str,
    ) -> Result<ListLeaderboardSubmissionsResponse, RacingError> {
        let request = ListLeaderboardSubmissionsRequest {
            leaderboard_arn: leaderboard_arn.to_string(),
            next_token: None,
        };
        self.call("ListLeaderboardSubmissions", &request).await
    }

    pub async fn list_private_leaderboard_participants(
        &self,
        leaderboard_arn: &str,
        max_results: u32,
    ) -> Result<ListPrivateLeaderboardParticipantsResponse, RacingError> {
        let request = ListPrivateLeaderboardParticipantsRequest {
            max_results,
            leaderboard_arn: leaderboard_arn.to_string(),
            leaderboard_access_roles: vec![
                LeaderboardAccessRole::Admin,
                LeaderboardAccessRole::Participant,
            ],
            include_extended_user_data: true,
        };
        self.call("ListPrivateLeaderboardParticipants", &request)
            .await
    }

    // -------------------------------------------------------------------------
    // Helper Methods
    // -------------------------------------------------------------------------

    /// Sends a signed JSON 1.1 request for `operation` and parses the response.
    async fn call<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: &Req,
    ) -> Result<Resp, RacingError> {
        let body = serde_json::to_string(request)?;
        let target = format!("{TARGET_PREFIX}.{operation}");
        tracing::debug!(operation, "Sending racing service request");

        let signed_headers = self.sign_request(&target, &body).await?;
        let mut builder = self
            .http_client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
            .header(AMZ_TARGET_HEADER, &target);
        for (name, value) in &signed_headers {
            builder = builder.header(name, value);
        }

        let response = builder.body(body).send().await?;
        let response = Self::check_response(response).await?;
        let bytes = response.bytes().await?;
        // Some operations answer with an empty body on success.
        if bytes.is_empty() {
            return Ok(serde_json::from_str("{}")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Computes the SigV4 headers (`authorization`, `x-amz-date`, ...) for a request.
    async fn sign_request(
        &self,
        target: &str,
        body: &str,
    ) -> Result<Vec<(String, String)>, RacingError> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| RacingError::Credentials(e.to_string()))?;
        let identity: Identity = credentials.into();
        let signing_params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(SERVICE_NAME)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| RacingError::Signing(e.to_string()))?
            .into();

        let headers = [
            ("content-type", AMZ_JSON_CONTENT_TYPE),
            ("host", self.host.as_str()),
            (AMZ_TARGET_HEADER, target),
        ];
        let signable = SignableRequest::new(
            "POST",
            Cow::Borrowed(self.endpoint.as_str()),
            headers.into_iter(),
            SignableBody::Bytes(body.as_bytes()),
        )
        .map_err(|e| RacingError::Signing(e.to_string()))?;
        let (instructions, _signature) = sign(signable, &signing_params)
            .map_err(|e| RacingError::Signing(e.to_string()))?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }

    /// Checks the response status and extracts error details if needed.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, RacingError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        let header_error_type = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(':').next().unwrap_or(value).to_string());
        let error_response = response
            .json::<ErrorResponse>()
            .await
            .unwrap_or_default();
        let error_type = error_response
            .short_error_type()
            .map(str::to_string)
            .or(header_error_type);
        let message = match error_response.message {
            Some(message) => message,
            None => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        };

        tracing::debug!(status_code, error_type = ?error_type, "Racing service returned an error");
        Err(RacingError::Http {
            status_code,
            error_type,
            message,
        })
    }
}
