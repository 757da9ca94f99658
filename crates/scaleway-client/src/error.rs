//! Scaleway client errors

use thiserror::Error;

/// Errors that can occur when interacting with the Scaleway API
#[derive(Debug, Error)]
pub enum ScalewayError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Scaleway API returned an error
    #[error("Scaleway API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the API
        status: u16,
        /// Error message returned by the API
        message: String,
    },

    /// The API refused the operation because a precondition does not hold,
    /// e.g. deleting a private network that still has attached resources.
    /// Retryable once the attached resources are gone.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A lookup that expected exactly one item found none
    #[error("no item found")]
    NoItemFound,

    /// A lookup that expected exactly one item found several
    #[error("expected to find only one item, found {0}")]
    TooManyItemsFound(usize),

    /// Invalid request (e.g. missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
