//! Key-set fetching and JWK conversion.

use crate::{Error, Result};

use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Timeout applied to a single key-set fetch.
pub(crate) const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A JWKS (JSON Web Key Set) document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JwkSet {
    /// Keys.
    pub keys: Vec<Jwk>,
}

/// Minimal JWK structure for RSA/EC/OKP.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC", "OKP").
    pub kty: String,

    /// Key id.
    pub kid: Option<String>,

    /// Public key use.
    #[serde(rename = "use")]
    pub use_: Option<String>,

    /// Algorithm (optional).
    pub alg: Option<String>,

    // RSA
    /// RSA modulus.
    pub n: Option<String>,
    /// RSA exponent.
    pub e: Option<String>,

    // EC
    /// Curve name.
    pub crv: Option<String>,
    /// EC x coordinate.
    pub x: Option<String>,
    /// EC y coordinate.
    pub y: Option<String>,

    // Symmetric (not supported)
    /// Symmetric key.
    pub k: Option<String>,
}

/// A usable public key: decoding material plus its declared algorithm.
///
/// Immutable once stored in the cache.
#[derive(Clone)]
pub struct KeyEntry {
    /// Decoding key built from the JWK components.
    pub key: DecodingKey,
    /// Algorithm the key is published for.
    pub alg: Algorithm,
}

impl std::fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEntry").field("alg", &self.alg).finish_non_exhaustive()
    }
}

/// Fetch the key set published at `url` and parse it into a kid-keyed map.
///
/// One HTTP round trip, no shared-state mutation; storage is the caller's
/// concern. Non-2xx responses, malformed documents, and documents with zero
/// usable keys are all [`Error::KeyFetch`].
pub async fn fetch_key_set(
    client: &reqwest::Client,
    url: &str,
) -> Result<HashMap<String, KeyEntry>> {
    let resp = client.get(url).timeout(FETCH_TIMEOUT).send().await?;
    if !resp.status().is_success() {
        return Err(Error::KeyFetch(format!("{url}: status {}", resp.status())));
    }

    let set: JwkSet = resp.json().await?;

    let mut keys = HashMap::new();
    for jwk in &set.keys {
        let Some(kid) = jwk.kid.clone() else {
            continue;
        };
        match key_entry_from_jwk(jwk) {
            Ok(entry) => {
                keys.insert(kid, entry);
            }
            Err(e) => {
                tracing::debug!(kid = %kid, error = %e, "skipping unusable JWK");
            }
        }
    }

    if keys.is_empty() {
        return Err(Error::KeyFetch(format!("{url}: no usable keys in key set")));
    }
    Ok(keys)
}

fn key_entry_from_jwk(jwk: &Jwk) -> Result<KeyEntry> {
    let key = decoding_key_from_jwk(jwk)?;
    let alg = declared_algorithm(jwk)?;
    Ok(KeyEntry { key, alg })
}

fn declared_algorithm(jwk: &Jwk) -> Result<Algorithm> {
    if let Some(alg) = jwk.alg.as_deref() {
        return Algorithm::from_str(alg)
            .map_err(|_| Error::KeyFetch(format!("unsupported JWK alg: {alg}")));
    }
    // No alg declared; take the conventional default for the key type.
    match jwk.kty.as_str() {
        "RSA" => Ok(Algorithm::RS256),
        "EC" => Ok(Algorithm::ES256),
        "OKP" => Ok(Algorithm::EdDSA),
        other => Err(Error::KeyFetch(format!("unsupported kty: {other}"))),
    }
}

fn decoding_key_from_jwk(jwk: &Jwk) -> Result<DecodingKey> {
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk
                .n
                .as_deref()
                .ok_or_else(|| Error::KeyFetch("RSA JWK missing n".to_string()))?;
            let e = jwk
                .e
                .as_deref()
                .ok_or_else(|| Error::KeyFetch("RSA JWK missing e".to_string()))?;
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| Error::KeyFetch(format!("invalid RSA components: {e}")))
        }
        "EC" => {
            let x = jwk
                .x
                .as_deref()
                .ok_or_else(|| Error::KeyFetch("EC JWK missing x".to_string()))?;
            let y = jwk
                .y
                .as_deref()
                .ok_or_else(|| Error::KeyFetch("EC JWK missing y".to_string()))?;
            DecodingKey::from_ec_components(x, y)
                .map_err(|e| Error::KeyFetch(format!("invalid EC components: {e}")))
        }
        "OKP" => {
            // Providers publish Ed25519 as OKP + x (public key bytes base64url).
            let crv = jwk.crv.as_deref().unwrap_or("");
            if crv != "Ed25519" {
                return Err(Error::KeyFetch(format!("unsupported OKP curve: {crv}")));
            }
            let x = jwk
                .x
                .as_deref()
                .ok_or_else(|| Error::KeyFetch("OKP JWK missing x".to_string()))?;
            DecodingKey::from_ed_components(x)
                .map_err(|e| Error::KeyFetch(format!("invalid okp x: {e}")))
        }
        other => Err(Error::KeyFetch(format!("unsupported kty: {other}"))),
    }
}

fn ed25519_spki_der(pubkey32: &[u8]) -> Vec<u8> {
    // SubjectPublicKeyInfo for Ed25519:
    // SEQUENCE {
    //   SEQUENCE { OID 1.3.101.112 }
    //   BIT STRING (pubkey)
    // }
    // This is a tiny DER builder just for this structure.

    // OID 1.3.101.112 DER: 06 03 2B 65 70
    let mut alg_id: Vec<u8> = vec![0x30, 0x05, 0x06, 0x03, 0x2B, 0x65, 0x70];

    // BIT STRING: 03 21 00 <32 bytes>
    let mut bit_string: Vec<u8> = vec![0x03, 0x21, 0x00];
    bit_string.extend_from_slice(&pubkey32[..32]);

    // Outer SEQUENCE length = alg_id + bit_string
    let len = alg_id.len() + bit_string.len();
    let mut out: Vec<u8> = vec![0x30, len as u8];
    out.append(&mut alg_id);
    out.append(&mut bit_string);
    out
}
