//! Calling-context identity.

use crate::{Error, Result};

/// Identity of the caller's tenant plus the API bases derived from it.
///
/// Every validation and upload operation starts from one of these; the
/// organization and environment fields are required and checked before any
/// network or cryptographic work happens.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Organization the inbound request belongs to.
    pub organization: String,

    /// Environment within the organization (e.g. `test`, `prod`).
    pub environment: String,

    /// Base URL of the remote-service API that publishes signing keys.
    pub remote_service_api: String,

    /// Base URL of the internal management API (analytics ingestion).
    pub internal_api: String,
}

impl AuthContext {
    /// URL of the key-publication (JWKS) endpoint for this context.
    pub fn jwks_url(&self) -> String {
        format!("{}/certs", self.remote_service_api.trim_end_matches('/'))
    }

    /// URL of the analytics ingestion endpoint for this context.
    pub fn analytics_url(&self) -> String {
        format!(
            "{}/axpublisher/organization/{}/environment/{}",
            self.internal_api.trim_end_matches('/'),
            self.organization,
            self.environment
        )
    }

    /// Ensure the required tenant identifiers are present.
    ///
    /// Missing identifiers are a deployment problem, not an authentication
    /// failure, and are reported as [`Error::Configuration`].
    pub fn validate(&self) -> Result<()> {
        if self.organization.is_empty() || self.environment.is_empty() {
            return Err(Error::Configuration(
                "organization and environment are required".to_string(),
            ));
        }
        Ok(())
    }
}
