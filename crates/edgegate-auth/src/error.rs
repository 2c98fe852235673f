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

    /// Unable to fetch or parse a key set from the publication endpoint.
    #[error("key fetch failed: {0}")]
    KeyFetch(String),

    /// No key with the token's kid exists after a fetch attempt.
    #[error("no key found for kid {0:?}")]
    KeyNotFound(Option<String>),

    /// The token's declared algorithm does not match the stored key's.
    #[error("token algorithm {token:?} does not match key algorithm {key:?}")]
    AlgorithmMismatch {
        /// Algorithm declared in the token header.
        token: jsonwebtoken::Algorithm,
        /// Algorithm of the published key.
        key: jsonwebtoken::Algorithm,
    },

    /// Signature verification failed against the resolved key.
    #[error("invalid token signature")]
    SignatureInvalid,

    /// The token's expiration is at or before validation time.
    #[error("token expired at {0}")]
    TokenExpired(i64),

    /// The token's not-before is still in the future.
    #[error("token not valid before {0}")]
    TokenNotYetValid(i64),

    /// Token is malformed or missing required header fields.
    #[error("invalid JWT: {0}")]
    InvalidJwt(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::KeyFetch(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::KeyFetch(e.to_string())
    }
}
