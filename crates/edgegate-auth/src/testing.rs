//! Shared helpers for in-crate tests: deterministic Ed25519 keys, JWKS
//! documents, and token minting.

use base64::Engine;
use ed25519_dalek::SigningKey;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

/// Deterministic signing key; distinct seeds give distinct keys.
pub fn test_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

/// JWKS document publishing `key` under `kid`.
pub fn jwks_body(kid: &str, key: &SigningKey) -> Value {
    let x = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .encode(key.verifying_key().to_bytes());
    json!({
        "keys": [{
            "kty": "OKP",
            "crv": "Ed25519",
            "kid": kid,
            "alg": "EdDSA",
            "use": "sig",
            "x": x,
        }]
    })
}

/// Mint an EdDSA token over `claims` with the given header kid.
pub fn sign_token(key: &SigningKey, kid: &str, claims: Value) -> String {
    let der = key.to_pkcs8_der().expect("pkcs8 der");
    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = Some(kid.to_string());
    jsonwebtoken::encode(&header, &claims, &EncodingKey::from_ed_der(der.as_bytes()))
        .expect("token")
}

/// Assemble a token from raw header and claim JSON with garbage signature
/// bytes, for exercising checks that run before signature verification.
pub fn forge_token(header: &Value, claims: &Value) -> String {
    let enc = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    format!(
        "{}.{}.{}",
        enc.encode(header.to_string()),
        enc.encode(claims.to_string()),
        enc.encode("sig")
    )
}

/// The claim set the upstream authority issues, anchored at `now`.
pub fn standard_claims(now: i64) -> Value {
    json!({
        "aud": "remote-service-client",
        "jti": "29e2320b-787c-4625-8599-acc5e05c68d0",
        "iss": "https://org-test.example.net/remote-service/token",
        "nbf": now - 600,
        "iat": now,
        "exp": now + 60,
        "access_token": "8E7Az3ZgPHKrgzcQA54qAzXT3Z1G",
        "client_id": "yBQ5eXZA8rSoipYEi1Rmn0Z8RKtkGI4H",
        "application_name": "61cd4d83-06b5-4270-a9ee-cf9255ef45c3",
        "scope": "scope1 scope2",
        "api_product_list": ["TestProduct"],
    })
}
