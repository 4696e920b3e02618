//! Auth middleware: attach the credential, refresh-and-retry on auth
//! failures.
//!
//! One call moves through `not-authenticated → token-attached → (success |
//! auth-failure)`; on an auth failure with budget remaining it goes
//! `refreshing → token-attached(new) → (success | failure-propagated)`. The
//! budget lives in the context bag, so it holds across outer retry loops for
//! the same call.

use crate::controller::{AuthController, AuthOptions};
use crate::store::TokenStore as _;
use courier_core::{Context, Error, Request, Response, Result};
use courier_middleware::{BoxFuture, Middleware, Next};
use http::{HeaderName, HeaderValue, StatusCode};

/// Reactive refresh budget consumed so far, tracked per call.
#[derive(Debug, Clone, Copy, Default)]
struct RefreshBudgetUsed(u32);

fn with_token(request: &Request, header: &HeaderName, prefix: &str, token: &str) -> Result<Request> {
    let value = HeaderValue::from_str(&format!("{prefix}{token}")).map_err(|err| {
        Error::config_with_cause("authorization token is not a valid header value", err)
    })?;
    Ok(request.to_builder().header(header.clone(), value).build())
}

fn is_auth_failure(error: &Error) -> bool {
    matches!(error, Error::Http { status, .. } if *status == StatusCode::UNAUTHORIZED)
}

/// Middleware attaching a bearer-style credential to outgoing requests.
#[derive(Debug, Clone)]
pub struct AuthMiddleware {
    controller: AuthController,
}

impl AuthMiddleware {
    /// Creates the middleware with its own controller.
    #[must_use]
    pub fn new(options: AuthOptions) -> Self {
        Self {
            controller: AuthController::new(options),
        }
    }

    /// Creates the middleware around an existing controller, so imperative
    /// code can share the same single-flight slot.
    #[must_use]
    pub fn with_controller(controller: AuthController) -> Self {
        Self { controller }
    }

    /// Returns the controller.
    #[must_use]
    pub fn controller(&self) -> &AuthController {
        &self.controller
    }
}

impl Middleware for AuthMiddleware {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn handle<'a>(
        &'a self,
        request: Request,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response>> {
        Box::pin(async move {
            let options = self.controller.options();

            let token = self.controller.ensure_valid_token().await?;
            let authed = if token.is_empty() {
                request
            } else {
                with_token(&request, &options.header, &options.prefix, &token)?
            };

            let error = match next.run(authed.clone(), ctx).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            let wants_refresh = match &options.should_refresh {
                Some(classifier) => classifier(&error, &authed, ctx),
                None => is_auth_failure(&error),
            };
            if !wants_refresh {
                return Err(error);
            }

            let used = ctx.bag().get::<RefreshBudgetUsed>().unwrap_or_default().0;
            if used >= options.max_retry {
                return Err(error);
            }
            ctx.bag().insert(RefreshBudgetUsed(used + 1));

            match self.controller.refresh().await {
                Ok(new_token) => {
                    tracing::debug!(call = %ctx.id(), "auth failure, retrying with refreshed token");
                    let retried = with_token(&authed, &options.header, &options.prefix, &new_token)?;
                    next.rewind();
                    next.run(retried, ctx).await
                }
                Err(refresh_error) => {
                    options.store.clear().await;
                    if let Some(callback) = &options.on_refresh_failed {
                        callback(&refresh_error);
                    }
                    tracing::debug!(call = %ctx.id(), error = %refresh_error, "token refresh failed");
                    Err(refresh_error)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{FreshToken, RefreshFn};
    use crate::store::{MemoryTokenStore, TokenStore};
    use courier_middleware::{Pipeline, Terminal};
    use http::header::AUTHORIZATION;
    use http::{HeaderMap, Method};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};
    use tokio_util::sync::CancellationToken;

    /// Answers 401 until the expected token shows up, then 200.
    struct TokenGate {
        accept: Option<&'static str>,
        calls: Arc<AtomicUsize>,
        seen_auth: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl Terminal for TokenGate {
        fn invoke<'a>(
            &'a self,
            request: Request,
            _ctx: &'a mut Context,
        ) -> BoxFuture<'a, Result<Response>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let presented = request
                    .header(&AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                self.seen_auth.lock().push(presented.clone());

                let accepted = self
                    .accept
                    .is_some_and(|token| presented.as_deref() == Some(token));
                if accepted {
                    Ok(Response::builder(StatusCode::OK, request.url()).build())
                } else {
                    Err(Error::http(
                        StatusCode::UNAUTHORIZED,
                        request.url(),
                        None,
                        HeaderMap::new(),
                    ))
                }
            })
        }
    }

    fn refresh_ok(counter: Arc<AtomicUsize>, token: &'static str) -> RefreshFn {
        Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(FreshToken {
                    token: token.to_string(),
                    expires_at: Some(SystemTime::now() + Duration::from_secs(3600)),
                })
            })
        })
    }

    fn refresh_err(counter: Arc<AtomicUsize>) -> RefreshFn {
        Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::network("issuer down"))
            })
        })
    }

    async fn store_with_token(token: &str) -> Arc<MemoryTokenStore> {
        let store = Arc::new(MemoryTokenStore::new());
        store.set_token(token.to_string(), None).await;
        store
    }

    fn request() -> Request {
        Request::builder(Method::GET, "https://example.com").build()
    }

    fn pipeline(options: AuthOptions) -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline.push(AuthMiddleware::new(options));
        pipeline
    }

    #[tokio::test]
    async fn attaches_the_stored_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_auth = Arc::new(Mutex::new(Vec::new()));
        let terminal = TokenGate {
            accept: Some("Bearer t1"),
            calls: calls.clone(),
            seen_auth: seen_auth.clone(),
        };

        let store = store_with_token("t1").await;
        let refreshes = Arc::new(AtomicUsize::new(0));
        let options = AuthOptions::new(store, refresh_ok(refreshes.clone(), "unused"));

        let mut ctx = Context::new(CancellationToken::new());
        pipeline(options)
            .dispatch(request(), &mut ctx, &terminal)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(
            *seen_auth.lock(),
            vec![Some("Bearer t1".to_string())]
        );
    }

    #[tokio::test]
    async fn refreshes_and_retries_once_on_401() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_auth = Arc::new(Mutex::new(Vec::new()));
        let terminal = TokenGate {
            accept: Some("Bearer fresh"),
            calls: calls.clone(),
            seen_auth: seen_auth.clone(),
        };

        let store = store_with_token("stale").await;
        let refreshes = Arc::new(AtomicUsize::new(0));
        let options = AuthOptions::new(store.clone(), refresh_ok(refreshes.clone(), "fresh"));

        let mut ctx = Context::new(CancellationToken::new());
        let response = pipeline(options)
            .dispatch(request(), &mut ctx, &terminal)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(
            *seen_auth.lock(),
            vec![
                Some("Bearer stale".to_string()),
                Some("Bearer fresh".to_string())
            ]
        );
        assert_eq!(store.token().await, Some("fresh".to_string()));
    }

    #[tokio::test]
    async fn persistent_401_fails_after_exactly_two_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = TokenGate {
            accept: None,
            calls: calls.clone(),
            seen_auth: Arc::new(Mutex::new(Vec::new())),
        };

        let store = store_with_token("t1").await;
        let refreshes = Arc::new(AtomicUsize::new(0));
        let options = AuthOptions::new(store, refresh_ok(refreshes.clone(), "t2")).max_retry(1);

        let mut ctx = Context::new(CancellationToken::new());
        let err = pipeline(options)
            .dispatch(request(), &mut ctx, &terminal)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_failure_clears_the_store_and_fires_the_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = TokenGate {
            accept: None,
            calls: calls.clone(),
            seen_auth: Arc::new(Mutex::new(Vec::new())),
        };

        let store = store_with_token("t1").await;
        let refreshes = Arc::new(AtomicUsize::new(0));
        let callback_errors = Arc::new(Mutex::new(Vec::new()));
        let options = AuthOptions::new(store.clone(), refresh_err(refreshes.clone()))
            .on_refresh_failed({
                let callback_errors = callback_errors.clone();
                Arc::new(move |error| callback_errors.lock().push(error.to_string()))
            });

        let mut ctx = Context::new(CancellationToken::new());
        let err = pipeline(options)
            .dispatch(request(), &mut ctx, &terminal)
            .await
            .unwrap_err();

        // The refresh error propagates, not the original 401.
        assert!(matches!(err, Error::Network { .. }));
        assert_eq!(store.token().await, None);
        assert_eq!(callback_errors.lock().len(), 1);
        assert!(callback_errors.lock()[0].contains("issuer down"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_auth_errors_are_not_retried() {
        struct AlwaysNetworkError {
            calls: Arc<AtomicUsize>,
        }

        impl Terminal for AlwaysNetworkError {
            fn invoke<'a>(
                &'a self,
                _request: Request,
                _ctx: &'a mut Context,
            ) -> BoxFuture<'a, Result<Response>> {
                Box::pin(async move {
                    self.calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::network("connection refused"))
                })
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = AlwaysNetworkError { calls: calls.clone() };

        let store = store_with_token("t1").await;
        let refreshes = Arc::new(AtomicUsize::new(0));
        let options = AuthOptions::new(store, refresh_ok(refreshes.clone(), "t2"));

        let mut ctx = Context::new(CancellationToken::new());
        let err = pipeline(options)
            .dispatch(request(), &mut ctx, &terminal)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Network { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_token_goes_out_unauthenticated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_auth = Arc::new(Mutex::new(Vec::new()));
        let terminal = TokenGate {
            accept: Some("Bearer fresh"),
            calls: calls.clone(),
            seen_auth: seen_auth.clone(),
        };

        let store = Arc::new(MemoryTokenStore::new());
        let refreshes = Arc::new(AtomicUsize::new(0));
        let options = AuthOptions::new(store, refresh_ok(refreshes.clone(), "fresh"));

        let mut ctx = Context::new(CancellationToken::new());
        let response = pipeline(options)
            .dispatch(request(), &mut ctx, &terminal)
            .await
            .unwrap();

        // First attempt without a header draws the 401, the refresh supplies
        // the credential for the retry.
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*seen_auth.lock(), vec![None, Some("Bearer fresh".to_string())]);
    }

    #[tokio::test]
    async fn custom_classifier_overrides_the_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = TokenGate {
            accept: None,
            calls: calls.clone(),
            seen_auth: Arc::new(Mutex::new(Vec::new())),
        };

        let store = store_with_token("t1").await;
        let refreshes = Arc::new(AtomicUsize::new(0));
        let options = AuthOptions::new(store, refresh_ok(refreshes.clone(), "t2"))
            .should_refresh(Arc::new(|_error, _request, _ctx| false));

        let mut ctx = Context::new(CancellationToken::new());
        let err = pipeline(options)
            .dispatch(request(), &mut ctx, &terminal)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }
}
