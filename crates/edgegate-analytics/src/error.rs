//! Error types.

use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The calling context is missing required identity fields.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The collection endpoint did not accept the batch.
    #[error("analytics rejected. status: {status}, body: {body}")]
    Rejected {
        /// HTTP status returned by the collection endpoint.
        status: u16,
        /// Response body, surfaced for diagnosis.
        body: String,
    },

    /// An error occurred while performing HTTP requests.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
