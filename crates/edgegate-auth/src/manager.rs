//! Manager facade and background refresh scheduler.

use crate::Result;
use crate::cache::KeyCache;
use crate::context::AuthContext;
use crate::verify::{VerifiedClaims, parse_token};

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Composes the key cache, token validator, and refresh scheduler behind the
/// externally callable operations: `start`, `stop`, `parse_jwt`, `refresh`.
///
/// One instance per configured refresh interval; `parse_jwt` is safe to call
/// from many tasks concurrently against the same instance.
pub struct JwtManager {
    cache: Arc<KeyCache>,
    refresh_interval: Duration,
    scheduler: Mutex<Option<Scheduler>>,
}

struct Scheduler {
    shutdown: watch::Sender<()>,
    task: JoinHandle<()>,
}

impl JwtManager {
    /// Create a manager that refreshes cached key sets every `refresh_interval`.
    ///
    /// The interval is fixed for the lifetime of the manager. No background
    /// activity happens until [`start`](Self::start) is called.
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            cache: Arc::new(KeyCache::new()),
            refresh_interval,
            scheduler: Mutex::new(None),
        }
    }

    /// Launch the background refresh timer. Calling it again is a no-op.
    ///
    /// Each tick re-fetches every cached endpoint; failures are logged and
    /// swallowed so a remote outage degrades to serving stale keys rather
    /// than disturbing request-path validation.
    pub fn start(&self) {
        let mut guard = self.scheduler.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            return;
        }

        let cache = self.cache.clone();
        let interval = self.refresh_interval;
        let (shutdown, mut signal) = watch::channel(());
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; the cache is still empty
            // at that point, so consume it before entering the loop.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = cache.refresh_all().await {
                            tracing::warn!(error = %e, "background key refresh failed");
                        }
                    }
                    _ = signal.changed() => break,
                }
            }
        });

        *guard = Some(Scheduler { shutdown, task });
    }

    /// Halt the background timer. No further ticks fire; a refresh already
    /// executing completes before the task exits.
    pub fn stop(&self) {
        let mut guard = self.scheduler.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(scheduler) = guard.take() {
            // Signal rather than abort: the loop only observes shutdown
            // between ticks, letting an in-flight refresh finish.
            let _ = scheduler.shutdown.send(());
            drop(scheduler.task);
        }
    }

    /// Validate `token` for the tenant described by `ctx`.
    ///
    /// The key-publication endpoint is derived from the context. With
    /// `verify` the signature is checked against the published key (fetched
    /// once on a cache miss); without it the token is only decoded. Either
    /// way the context's identity fields are checked first and time claims
    /// are enforced.
    pub async fn parse_jwt(
        &self,
        ctx: &AuthContext,
        token: &str,
        verify: bool,
    ) -> Result<VerifiedClaims> {
        ctx.validate()?;
        parse_token(&self.cache, &ctx.jwks_url(), token, verify).await
    }

    /// Re-fetch every cached endpoint now, returning the first error.
    ///
    /// Same routine the timer runs, but the error surfaces to the caller so
    /// an operator-triggered rotation pickup gets explicit feedback.
    pub async fn refresh(&self) -> Result<()> {
        self.cache.refresh_all().await
    }

    /// The underlying key cache (shared with the scheduler task).
    pub(crate) fn cache(&self) -> &KeyCache {
        &self.cache
    }
}

impl Drop for JwtManager {
    fn drop(&mut self) {
        self.stop();
    }
}
