//! Error types for the IT Ops client.

use thiserror::Error;

/// Client error types.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Query string encoding failed.
    #[error("query encoding error: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// API returned an error envelope.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing, invalid or expired token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded.
    #[error("Rate limited, retry after {retry_after:?}s")]
    RateLimited {
        /// Seconds to wait, from the `Retry-After` header.
        retry_after: Option<u64>,
    },

    /// A successful envelope carried no payload.
    #[error("response carried no data")]
    MissingData,
}
