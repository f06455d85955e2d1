//! Error types for the oracle clients.

use thiserror::Error;

/// Result type for oracle operations.
pub type OracleResult<T> = Result<T, OracleError>;

/// Errors that can occur when calling an external service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OracleError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// The service answered but declined the request.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The service reported success without any code.
    #[error("Empty response from code generation")]
    EmptyResponse,

    /// No answer within the configured time.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The service endpoint is not a valid URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl OracleError {
    /// Whether the failure came from the service's answer rather than transport.
    pub fn is_rejection(&self) -> bool {
        matches!(self, OracleError::Rejected(_) | OracleError::EmptyResponse)
    }
}
