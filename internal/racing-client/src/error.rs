//! Error types for the racing service client.

use thiserror::Error;

/// Errors that can occur when using the racing service client.
#[derive(Error, Debug)]
pub enum RacingError {
    /// Non-success response returned by the service.
    ///
    /// `error_type` carries the service error code (e.g. `ValidationException`)
    /// when the response body included one.
    #[error("HTTP error {status_code} ({}): {message}", error_type.as_deref().unwrap_or("unknown error type"))]
    Http {
        status_code: u16,
        error_type: Option<String>,
        message: String,
    },

    /// Error making the HTTP request.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Error parsing a JSON response or serializing a request.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No credentials could be resolved from the configured provider.
    #[error("Failed to resolve AWS credentials: {0}")]
    Credentials(String),

    /// The request could not be signed.
    #[error("Failed to sign request: {0}")]
    Signing(String),

    /// The response parsed, but lacked a field the operation requires.
    #[error("Missing field `{field}` in `{operation}` response")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },
}

impl RacingError {
    /// Returns the service error code, if this error came from the service.
    pub fn error_type(&self) -> Option<&str> {
        match self {
            RacingError::Http { error_type, .. } => error_type.as_deref(),
            _ => None,
        }
    }
}
