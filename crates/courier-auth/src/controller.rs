//! Auth controller: token validity checks and single-flight refresh.

use crate::store::{TokenMeta, TokenStore};
use courier_core::{Context, Error, Request, Result};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use http::header::AUTHORIZATION;
use http::HeaderName;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A freshly obtained credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshToken {
    /// The token value.
    pub token: String,
    /// When it expires, if the issuer says.
    pub expires_at: Option<SystemTime>,
}

/// The user-supplied refresh operation.
pub type RefreshFn = Arc<dyn Fn() -> BoxFuture<'static, Result<FreshToken>> + Send + Sync>;

/// Classifier deciding whether a failure warrants a refresh-and-retry.
pub type RefreshClassifier = Arc<dyn Fn(&Error, &Request, &Context) -> bool + Send + Sync>;

/// Callback invoked when a refresh operation fails.
pub type RefreshFailedCallback = Arc<dyn Fn(&Error) + Send + Sync>;

/// Configuration for the auth controller and middleware.
#[derive(Clone)]
pub struct AuthOptions {
    /// Token storage.
    pub store: Arc<dyn TokenStore>,
    /// Refresh operation.
    pub refresh: RefreshFn,
    /// Safety margin subtracted from the expiry for the proactive check.
    pub leeway: Duration,
    /// Custom refresh classifier; the default is "HTTP 401".
    pub should_refresh: Option<RefreshClassifier>,
    /// Header the credential is attached to.
    pub header: HeaderName,
    /// Prefix put in front of the token value.
    pub prefix: String,
    /// Invoked when a refresh fails, before the failure propagates.
    pub on_refresh_failed: Option<RefreshFailedCallback>,
    /// Reactive refresh-and-retry budget per call.
    pub max_retry: u32,
}

impl AuthOptions {
    /// Creates options with the conventional defaults: `Authorization:
    /// Bearer <token>`, 60 s leeway, one reactive retry.
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, refresh: RefreshFn) -> Self {
        Self {
            store,
            refresh,
            leeway: Duration::from_secs(60),
            should_refresh: None,
            header: AUTHORIZATION,
            prefix: "Bearer ".to_string(),
            on_refresh_failed: None,
            max_retry: 1,
        }
    }

    /// Sets the proactive-refresh leeway.
    #[must_use]
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Sets a custom refresh classifier.
    #[must_use]
    pub fn should_refresh(mut self, classifier: RefreshClassifier) -> Self {
        self.should_refresh = Some(classifier);
        self
    }

    /// Sets the credential header name.
    #[must_use]
    pub fn header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    /// Sets the token prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the refresh-failure callback.
    #[must_use]
    pub fn on_refresh_failed(mut self, callback: RefreshFailedCallback) -> Self {
        self.on_refresh_failed = Some(callback);
        self
    }

    /// Sets the reactive refresh-and-retry budget.
    #[must_use]
    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }
}

impl std::fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOptions")
            .field("leeway", &self.leeway)
            .field("header", &self.header)
            .field("prefix", &self.prefix)
            .field("max_retry", &self.max_retry)
            .finish_non_exhaustive()
    }
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String>>>;

struct ControllerInner {
    options: AuthOptions,
    /// The single-flight slot. Holding the handle here is what de-duplicates
    /// concurrent refreshes; it is cleared from within the refresh future's
    /// own completion, so a caller arriving after settle starts a fresh one.
    in_flight: Mutex<Option<RefreshFuture>>,
}

/// Coordinates token refreshes across all concurrent calls sharing it.
#[derive(Clone)]
pub struct AuthController {
    inner: Arc<ControllerInner>,
}

impl AuthController {
    /// Creates a controller.
    #[must_use]
    pub fn new(options: AuthOptions) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                options,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn options(&self) -> &AuthOptions {
        &self.inner.options
    }

    /// Claims the refresh slot, or joins the refresh already in flight.
    ///
    /// Check and publish happen under one lock acquisition with no await in
    /// between; that is the whole single-flight guarantee on a preemptible
    /// runtime.
    fn claim_refresh(&self) -> RefreshFuture {
        let mut slot = self.inner.in_flight.lock();
        if let Some(existing) = slot.as_ref() {
            return existing.clone();
        }

        let inner = Arc::clone(&self.inner);
        let future: BoxFuture<'static, Result<String>> = Box::pin(async move {
            let outcome = async {
                let fresh = (inner.options.refresh)().await?;
                inner
                    .options
                    .store
                    .set_token(
                        fresh.token.clone(),
                        Some(TokenMeta {
                            expires_at: fresh.expires_at,
                        }),
                    )
                    .await;
                Ok(fresh.token)
            }
            .await;
            *inner.in_flight.lock() = None;
            outcome
        });
        let shared = future.shared();
        *slot = Some(shared.clone());
        tracing::debug!("token refresh started");
        shared
    }

    /// Refreshes the token, joining an in-flight refresh when one exists.
    ///
    /// On success the new token has already been persisted to the store
    /// before this resolves.
    pub async fn refresh(&self) -> Result<String> {
        self.claim_refresh().await
    }

    /// Returns a token that is valid for at least the configured leeway,
    /// refreshing first when the stored one is stale.
    pub async fn ensure_valid_token(&self) -> Result<String> {
        let options = &self.inner.options;
        let token = options.store.token().await.unwrap_or_default();

        let expires_at = match options.store.meta().await {
            Some(meta) => meta.expires_at,
            None => options
                .store
                .record()
                .await
                .and_then(|record| record.meta)
                .and_then(|meta| meta.expires_at),
        };
        let Some(expires_at) = expires_at else {
            return Ok(token);
        };

        if SystemTime::now() + options.leeway >= expires_at {
            tracing::debug!("stored token is within expiry leeway, refreshing");
            return self.refresh().await;
        }
        Ok(token)
    }
}

impl std::fmt::Debug for AuthController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthController")
            .field("options", &self.inner.options)
            .field("refresh_in_flight", &self.inner.in_flight.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTokenStore;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_refresh(
        counter: Arc<AtomicUsize>,
        outcome: Result<&'static str>,
    ) -> RefreshFn {
        Arc::new(move || {
            let counter = counter.clone();
            let outcome = outcome.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                // Stay in flight across an await point so concurrent callers
                // genuinely overlap.
                tokio::time::sleep(Duration::from_millis(10)).await;
                outcome.map(|token| FreshToken {
                    token: token.to_string(),
                    expires_at: Some(SystemTime::now() + Duration::from_secs(3600)),
                })
            })
        })
    }

    async fn expired_store() -> Arc<MemoryTokenStore> {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .set_token(
                "stale".to_string(),
                Some(TokenMeta {
                    expires_at: Some(SystemTime::now() - Duration::from_secs(3600)),
                }),
            )
            .await;
        store
    }

    #[tokio::test]
    async fn concurrent_expired_reads_share_one_refresh() {
        let counter = Arc::new(AtomicUsize::new(0));
        let store = expired_store().await;
        let controller = AuthController::new(AuthOptions::new(
            store.clone(),
            counting_refresh(counter.clone(), Ok("fresh")),
        ));

        let tokens = join_all((0..5).map(|_| {
            let controller = controller.clone();
            async move { controller.ensure_valid_token().await.unwrap() }
        }))
        .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(tokens.iter().all(|token| token == "fresh"));
        assert_eq!(store.token().await, Some("fresh".to_string()));
    }

    #[tokio::test]
    async fn refresh_after_settle_starts_a_new_operation() {
        let counter = Arc::new(AtomicUsize::new(0));
        let controller = AuthController::new(AuthOptions::new(
            Arc::new(MemoryTokenStore::new()),
            counting_refresh(counter.clone(), Ok("fresh")),
        ));

        controller.refresh().await.unwrap();
        controller.refresh().await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn valid_token_is_returned_without_refreshing() {
        let counter = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(MemoryTokenStore::new());
        store
            .set_token(
                "valid".to_string(),
                Some(TokenMeta {
                    expires_at: Some(SystemTime::now() + Duration::from_secs(3600)),
                }),
            )
            .await;

        let controller = AuthController::new(AuthOptions::new(
            store,
            counting_refresh(counter.clone(), Ok("fresh")),
        ));

        assert_eq!(controller.ensure_valid_token().await.unwrap(), "valid");
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn token_without_expiry_is_trusted() {
        let counter = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(MemoryTokenStore::new());
        store.set_token("opaque".to_string(), None).await;

        let controller = AuthController::new(AuthOptions::new(
            store,
            counting_refresh(counter.clone(), Ok("fresh")),
        ));

        assert_eq!(controller.ensure_valid_token().await.unwrap(), "opaque");
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn leeway_triggers_refresh_before_actual_expiry() {
        let counter = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(MemoryTokenStore::new());
        // Expires in 30 s, leeway 60 s: already considered stale.
        store
            .set_token(
                "soon".to_string(),
                Some(TokenMeta {
                    expires_at: Some(SystemTime::now() + Duration::from_secs(30)),
                }),
            )
            .await;

        let controller = AuthController::new(
            AuthOptions::new(store, counting_refresh(counter.clone(), Ok("fresh")))
                .leeway(Duration::from_secs(60)),
        );

        assert_eq!(controller.ensure_valid_token().await.unwrap(), "fresh");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_fans_out_to_every_waiter() {
        let counter = Arc::new(AtomicUsize::new(0));
        let controller = AuthController::new(AuthOptions::new(
            Arc::new(MemoryTokenStore::new()),
            counting_refresh(counter.clone(), Err(Error::network("issuer down"))),
        ));

        let outcomes = join_all((0..3).map(|_| {
            let controller = controller.clone();
            async move { controller.refresh().await }
        }))
        .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(outcomes.iter().all(Result::is_err));
    }
}
