//! edgegate-auth
//!
//! JWT verification and key-cache management for the edgegate sidecar.
//! Inbound bearer tokens are proven against signing keys published by the
//! remote authority, and the validated claims feed downstream authorization.
//! It covers three recurring problems:
//!
//! - **Verifying JWTs against a published key set** (kid resolution,
//!   algorithm match, signature, strict expiry with a documented nbf skew)
//! - **Keeping the key cache live** (single-flight fetch on miss, periodic
//!   background refresh, stale keys serving through remote outages)
//! - **Deriving tenant endpoints** from the calling context, with the
//!   required identity fields checked before any network or crypto work
//!
//! The core API is [`JwtManager`]: `start`/`stop` the background refresh,
//! `parse_jwt` on the request path, and `refresh` for on-demand rotation
//! pickup.
//!
//! ## Quick start
//! ```no_run
//! use edgegate_auth::{AuthContext, JwtManager};
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = JwtManager::new(Duration::from_secs(1800));
//! manager.start();
//!
//! let ctx = AuthContext {
//!     organization: "acme".to_string(),
//!     environment: "prod".to_string(),
//!     remote_service_api: "https://acme-prod.example.net/remote-service".to_string(),
//!     internal_api: "https://istioservices.example.net/edgemicro".to_string(),
//! };
//! let claims = manager.parse_jwt(&ctx, "eyJ...", true).await?;
//! println!("products={:?}", claims.api_products());
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]

mod cache;
mod context;
mod error;
mod jwks;
mod manager;
mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{EndpointStatus, KeyCache};
pub use context::AuthContext;
pub use error::{Error, Result};
pub use jwks::{Jwk, JwkSet, KeyEntry, fetch_key_set};
pub use manager::JwtManager;
pub use verify::{NBF_SKEW_SECS, VerifiedClaims, parse_token};
