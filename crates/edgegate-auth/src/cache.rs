//! Per-endpoint key cache with single-flight fetching.

use crate::Result;
use crate::jwks::{KeyEntry, fetch_key_set};

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{Mutex, RwLock};

/// Cached key-set state for one endpoint.
///
/// Replaced atomically under the write lock; readers never observe a
/// half-written set. A failed refresh records `last_error` and leaves the
/// previous keys in place, so stale-but-available keys keep serving.
#[derive(Default)]
struct KeySetState {
    keys: Option<HashMap<String, KeyEntry>>,
    fetched_at: Option<SystemTime>,
    last_error: Option<String>,
}

/// One endpoint's slot: the swappable state plus a fetch gate.
///
/// The gate serializes fetches for this endpoint only; `get` against other
/// endpoints never waits on it.
#[derive(Default)]
struct EndpointKeys {
    state: RwLock<KeySetState>,
    fetch: Mutex<()>,
}

/// Point-in-time snapshot of one endpoint's cache entry.
#[derive(Debug, Clone)]
pub struct EndpointStatus {
    /// When the current key set was fetched, if one is present.
    pub fetched_at: Option<SystemTime>,
    /// Message of the most recent failed fetch, cleared on success.
    pub last_error: Option<String>,
    /// Number of usable keys currently held.
    pub key_count: usize,
}

/// Concurrent cache of published signing keys, keyed by endpoint URL.
pub struct KeyCache {
    client: reqwest::Client,
    entries: DashMap<String, Arc<EndpointKeys>>,
}

impl KeyCache {
    /// Create an empty cache with its own HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            entries: DashMap::new(),
        }
    }

    fn entry(&self, endpoint: &str) -> Arc<EndpointKeys> {
        // Clone the Arc out so no dashmap shard guard is held across awaits.
        self.entries
            .entry(endpoint.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Return the key for `kid` at `endpoint`, if currently cached.
    ///
    /// Read-only: never triggers a fetch and never blocks on one in flight
    /// for a different endpoint.
    pub async fn get(&self, endpoint: &str, kid: &str) -> Option<KeyEntry> {
        let entry = self.entries.get(endpoint)?.value().clone();
        let state = entry.state.read().await;
        state.keys.as_ref()?.get(kid).cloned()
    }

    /// Fetch and store the key set for `endpoint` if it is not yet cached.
    ///
    /// Single-flight: concurrent callers for the same endpoint share one
    /// network fetch. Only a successful result is shared; a failed flight
    /// releases the gate and the next waiter makes its own attempt, so a
    /// failure is never latched into the entry. The fetch itself runs
    /// outside the state lock; only the swap of the completed result holds
    /// exclusive access.
    pub async fn ensure(&self, endpoint: &str) -> Result<()> {
        let entry = self.entry(endpoint);
        let _flight = entry.fetch.lock().await;

        // A previous flight may have filled the entry while we waited.
        if entry.state.read().await.keys.is_some() {
            return Ok(());
        }

        self.fetch_and_store(endpoint, &entry).await
    }

    /// Re-fetch every endpoint currently present in the cache.
    ///
    /// One bad endpoint does not stop the rest: the first error encountered
    /// is returned after all entries have been attempted. Failed entries keep
    /// their previous key set.
    pub async fn refresh_all(&self) -> Result<()> {
        let endpoints: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();

        let mut first_err = None;
        for endpoint in endpoints {
            let entry = self.entry(&endpoint);
            let _flight = entry.fetch.lock().await;
            if let Err(e) = self.fetch_and_store(&endpoint, &entry).await {
                tracing::debug!(endpoint = %endpoint, error = %e, "key refresh failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Snapshot of the cache entry for `endpoint`, if one exists.
    pub async fn status(&self, endpoint: &str) -> Option<EndpointStatus> {
        let entry = self.entries.get(endpoint)?.value().clone();
        let state = entry.state.read().await;
        Some(EndpointStatus {
            fetched_at: state.fetched_at,
            last_error: state.last_error.clone(),
            key_count: state.keys.as_ref().map_or(0, HashMap::len),
        })
    }

    /// Number of endpoints currently cached.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no endpoint has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch outside the lock, then install the result under it.
    ///
    /// Caller must hold the endpoint's fetch gate.
    async fn fetch_and_store(&self, endpoint: &str, entry: &EndpointKeys) -> Result<()> {
        let fetched = fetch_key_set(&self.client, endpoint).await;

        let mut state = entry.state.write().await;
        match fetched {
            Ok(keys) => {
                tracing::debug!(endpoint, count = keys.len(), "stored key set");
                state.keys = Some(keys);
                state.fetched_at = Some(SystemTime::now());
                state.last_error = None;
                Ok(())
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::testing::{jwks_body, test_key};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn ensure_is_single_flight() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks_body("1", &test_key(1)))
                    .set_delay(std::time::Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(KeyCache::new());
        let endpoint = format!("{}/certs", server.uri());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let endpoint = endpoint.clone();
            handles.push(tokio::spawn(async move { cache.ensure(&endpoint).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert!(cache.get(&endpoint, "1").await.is_some());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body("1", &test_key(1))))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let cache = KeyCache::new();
        let endpoint = format!("{}/certs", server.uri());
        cache.ensure(&endpoint).await.unwrap();

        let err = cache.refresh_all().await.unwrap_err();
        assert!(matches!(err, Error::KeyFetch(_)));

        // Stale keys still serve, and the failure is recorded on the entry.
        assert!(cache.get(&endpoint, "1").await.is_some());
        let status = cache.status(&endpoint).await.unwrap();
        assert!(status.last_error.is_some());
        assert!(status.fetched_at.is_some());
        assert_eq!(status.key_count, 1);
    }

    #[tokio::test]
    async fn key_set_without_usable_keys_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": [{"kty": "oct", "kid": "1", "k": "c2VjcmV0"}]
            })))
            .mount(&server)
            .await;

        let cache = KeyCache::new();
        let endpoint = format!("{}/certs", server.uri());
        let err = cache.ensure(&endpoint).await.unwrap_err();
        assert!(matches!(err, Error::KeyFetch(_)));
        assert!(cache.get(&endpoint, "1").await.is_none());
    }

    #[tokio::test]
    async fn failed_flight_is_not_latched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body("1", &test_key(1))))
            .mount(&server)
            .await;

        let cache = KeyCache::new();
        let endpoint = format!("{}/certs", server.uri());

        // The first flight fails; the next caller gets a fresh attempt.
        assert!(cache.ensure(&endpoint).await.is_err());
        cache.ensure(&endpoint).await.unwrap();
        assert!(cache.get(&endpoint, "1").await.is_some());
    }

    #[tokio::test]
    async fn get_does_not_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body("1", &test_key(1))))
            .expect(0)
            .mount(&server)
            .await;

        let cache = KeyCache::new();
        let endpoint = format!("{}/certs", server.uri());
        assert!(cache.get(&endpoint, "1").await.is_none());
    }
}
