//! Token validation: signature and time-claim checks.

use crate::cache::KeyCache;
use crate::{Error, Result};

use base64::Engine;
use jsonwebtoken::{Header, Validation};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Forward clock-skew tolerance applied to `nbf` only.
///
/// `exp` is compared strictly against wall clock with no leeway; a token
/// whose not-before is at most this many seconds in the future is accepted
/// to absorb issuer/verifier clock drift.
pub const NBF_SKEW_SECS: i64 = 10;

/// A validated JWT (header + claims).
///
/// Produced fresh per parse call; never cached. No partial claims are
/// returned on any validation failure.
#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    /// The parsed header.
    pub header: Header,
    /// The decoded claims as JSON.
    pub claims: Value,
}

impl VerifiedClaims {
    /// Get a claim by key.
    pub fn claim(&self, key: &str) -> Option<&Value> {
        self.claims.get(key)
    }

    /// Convenience accessor for `iss`.
    pub fn iss(&self) -> Option<&str> {
        self.claim("iss").and_then(|v| v.as_str())
    }

    /// Convenience accessor for `sub`.
    pub fn sub(&self) -> Option<&str> {
        self.claim("sub").and_then(|v| v.as_str())
    }

    /// Convenience accessor for `aud`.
    pub fn aud(&self) -> Option<&Value> {
        self.claim("aud")
    }

    /// Convenience accessor for `exp`.
    pub fn exp(&self) -> Option<i64> {
        self.claim("exp").and_then(Value::as_i64)
    }

    /// Convenience accessor for `nbf`.
    pub fn nbf(&self) -> Option<i64> {
        self.claim("nbf").and_then(Value::as_i64)
    }

    /// Convenience accessor for `iat`.
    pub fn iat(&self) -> Option<i64> {
        self.claim("iat").and_then(Value::as_i64)
    }

    /// The upstream access token carried in the claims.
    pub fn access_token(&self) -> Option<&str> {
        self.claim("access_token").and_then(|v| v.as_str())
    }

    /// The client id of the calling application.
    pub fn client_id(&self) -> Option<&str> {
        self.claim("client_id").and_then(|v| v.as_str())
    }

    /// The application name of the calling application.
    pub fn application_name(&self) -> Option<&str> {
        self.claim("application_name").and_then(|v| v.as_str())
    }

    /// Granted scopes, split on whitespace.
    pub fn scopes(&self) -> Vec<&str> {
        self.claim("scope")
            .and_then(|v| v.as_str())
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// API products the caller is entitled to.
    pub fn api_products(&self) -> Vec<String> {
        self.claim("api_product_list")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Validate `token` against the keys published at `endpoint`.
///
/// With `verify`, the key is resolved through the cache (fetching once on a
/// miss), the declared algorithm must match the stored key's, and the
/// signature must check out. Without it the token is only decoded. Time
/// claims are enforced on both paths.
pub async fn parse_token(
    cache: &KeyCache,
    endpoint: &str,
    token: &str,
    verify: bool,
) -> Result<VerifiedClaims> {
    let header = jsonwebtoken::decode_header(token)
        .map_err(|e| Error::InvalidJwt(format!("failed to decode header: {e}")))?;

    let verified = if verify {
        let key = resolve_key(cache, endpoint, header.kid.as_deref()).await?;

        if header.alg != key.alg {
            return Err(Error::AlgorithmMismatch {
                token: header.alg,
                key: key.alg,
            });
        }

        // Time claims are checked explicitly below so expiry stays strict
        // while nbf gets its documented skew tolerance.
        let mut validation = Validation::new(key.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims::<&str>(&[]);

        let data = jsonwebtoken::decode::<Value>(token, &key.key, &validation)
            .map_err(map_decode_error)?;
        VerifiedClaims {
            header: data.header,
            claims: data.claims,
        }
    } else {
        VerifiedClaims {
            claims: decode_payload(token)?,
            header,
        }
    };

    check_time_claims(&verified, now_epoch_secs())?;
    Ok(verified)
}

async fn resolve_key(
    cache: &KeyCache,
    endpoint: &str,
    kid: Option<&str>,
) -> Result<crate::jwks::KeyEntry> {
    let kid = kid.ok_or_else(|| Error::InvalidJwt("missing kid".to_string()))?;

    if let Some(key) = cache.get(endpoint, kid).await {
        return Ok(key);
    }
    cache.ensure(endpoint).await?;
    cache
        .get(endpoint, kid)
        .await
        .ok_or_else(|| Error::KeyNotFound(Some(kid.to_string())))
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> Error {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::InvalidSignature => Error::SignatureInvalid,
        _ => Error::InvalidJwt(e.to_string()),
    }
}

/// Decode the payload segment without verifying anything.
fn decode_payload(token: &str) -> Result<Value> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(Error::InvalidJwt("expected three token segments".to_string())),
    };
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::InvalidJwt(format!("invalid payload encoding: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::InvalidJwt(format!("invalid payload JSON: {e}")))
}

/// Expiration and not-before are independent checks (see [`NBF_SKEW_SECS`]).
fn check_time_claims(claims: &VerifiedClaims, now: i64) -> Result<()> {
    if let Some(exp) = claims.exp() {
        if exp <= now {
            return Err(Error::TokenExpired(exp));
        }
    }
    if let Some(nbf) = claims.nbf() {
        if nbf > now + NBF_SKEW_SECS {
            return Err(Error::TokenNotYetValid(nbf));
        }
    }
    Ok(())
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(v: Value) -> VerifiedClaims {
        VerifiedClaims {
            header: Header::default(),
            claims: v,
        }
    }

    #[test]
    fn expired_token_is_rejected_strictly() {
        let c = claims(json!({"exp": 1000}));
        assert!(matches!(check_time_claims(&c, 1000), Err(Error::TokenExpired(1000))));
        assert!(check_time_claims(&c, 999).is_ok());
    }

    #[test]
    fn nbf_gets_forward_skew_only() {
        let c = claims(json!({"nbf": 1000}));
        assert!(check_time_claims(&c, 1000 - NBF_SKEW_SECS).is_ok());
        assert!(matches!(
            check_time_claims(&c, 1000 - NBF_SKEW_SECS - 1),
            Err(Error::TokenNotYetValid(1000))
        ));
    }

    #[test]
    fn near_future_window_passes_both_checks() {
        // nbf 5s ahead, exp 2s ahead: valid under the documented tolerance.
        let now = 100;
        let c = claims(json!({"nbf": now + 5, "exp": now + 2}));
        assert!(check_time_claims(&c, now).is_ok());
    }

    #[test]
    fn missing_time_claims_are_skipped() {
        assert!(check_time_claims(&claims(json!({})), 0).is_ok());
    }

    #[test]
    fn custom_claim_accessors() {
        let c = claims(json!({
            "scope": "scope1 scope2",
            "api_product_list": ["TestProduct"],
            "access_token": "tok",
            "client_id": "cid",
        }));
        assert_eq!(c.scopes(), vec!["scope1", "scope2"]);
        assert_eq!(c.api_products(), vec!["TestProduct".to_string()]);
        assert_eq!(c.access_token(), Some("tok"));
        assert_eq!(c.client_id(), Some("cid"));
    }

    #[test]
    fn decode_payload_rejects_garbage() {
        assert!(decode_payload("not-a-token").is_err());
        assert!(decode_payload("a.!!!.c").is_err());
    }
}
