//! # Courier Retry
//!
//! Bounded-retry middleware occupying one pipeline stage.
//!
//! The loop is ordinary sequential retry: exactly one in-flight dispatch of
//! the inner chain exists at a time. Before each attempt the context's
//! attempt counter is updated so later middlewares, the transport and event
//! listeners observe the current number.
//!
//! A caller can override or disable the policy for a single call by storing
//! a [`RetryOverride`] in the request metadata extension map; the override is
//! read once when the stage is entered.

#![doc(html_root_url = "https://docs.rs/courier-retry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use courier_core::{Context, Error, Request, Response, Result};
use courier_middleware::{BoxFuture, Middleware, Next};
use std::sync::Arc;
use std::time::Duration;

/// Decides whether an error is worth retrying.
pub type RetryPredicate = Arc<dyn Fn(&Error, &Request, &Context) -> bool + Send + Sync>;

/// Computes the backoff before a given attempt.
pub type DelayFn = Arc<dyn Fn(u32, &Error, &Request, &Context) -> Duration + Send + Sync>;

/// Delay policy between attempts.
#[derive(Clone, Default)]
pub enum RetryDelay {
    /// Retry immediately.
    #[default]
    None,
    /// Wait a fixed duration between attempts.
    Fixed(Duration),
    /// Compute the wait from the upcoming attempt number, the error, the
    /// request and the context.
    Backoff(DelayFn),
}

impl RetryDelay {
    fn duration_for(
        &self,
        attempt: u32,
        error: &Error,
        request: &Request,
        ctx: &Context,
    ) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => *delay,
            Self::Backoff(delay_fn) => delay_fn(attempt, error, request, ctx),
        }
    }
}

impl std::fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            Self::Backoff(_) => f.write_str("Backoff(..)"),
        }
    }
}

/// Client-level retry policy.
#[derive(Clone, Default)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub retries: u32,
    /// Delay policy between attempts.
    pub delay: RetryDelay,
    /// Optional predicate limiting which errors are retried. Without one,
    /// every error is retryable.
    pub retry_on: Option<RetryPredicate>,
}

impl RetryPolicy {
    /// Creates a policy with a retry budget, no delay and no predicate.
    #[must_use]
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            ..Self::default()
        }
    }

    /// Sets a fixed delay between attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = RetryDelay::Fixed(delay);
        self
    }

    /// Sets a computed backoff between attempts.
    #[must_use]
    pub fn with_backoff(mut self, delay_fn: DelayFn) -> Self {
        self.delay = RetryDelay::Backoff(delay_fn);
        self
    }

    /// Sets the retryable-error predicate.
    #[must_use]
    pub fn with_retry_on(mut self, predicate: RetryPredicate) -> Self {
        self.retry_on = Some(predicate);
        self
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retries", &self.retries)
            .field("delay", &self.delay)
            .field("retry_on", &self.retry_on.is_some())
            .finish()
    }
}

/// Per-call override stored in the request metadata extension map.
///
/// `disable` switches retries off wholesale; the other fields override the
/// corresponding policy field for this call only.
#[derive(Clone, Default)]
pub struct RetryOverride {
    /// Disables retries entirely for this call.
    pub disable: bool,
    /// Overrides the retry budget.
    pub retries: Option<u32>,
    /// Overrides the delay policy.
    pub delay: Option<RetryDelay>,
    /// Overrides the retryable-error predicate.
    pub retry_on: Option<RetryPredicate>,
}

impl RetryOverride {
    /// An override that disables retries for one call.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            disable: true,
            ..Self::default()
        }
    }

    /// An override replacing just the retry budget.
    #[must_use]
    pub fn retries(retries: u32) -> Self {
        Self {
            retries: Some(retries),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for RetryOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOverride")
            .field("disable", &self.disable)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

/// The bounded-retry middleware.
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    policy: RetryPolicy,
}

impl RetryMiddleware {
    /// Creates the middleware from a client-level policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl Middleware for RetryMiddleware {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn handle<'a>(
        &'a self,
        request: Request,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response>> {
        Box::pin(async move {
            // The override is read once at stage entry.
            let overrides = request.meta().extensions().get::<RetryOverride>().cloned();
            let disabled = overrides.as_ref().is_some_and(|o| o.disable);

            let retries = if disabled {
                0
            } else {
                overrides
                    .as_ref()
                    .and_then(|o| o.retries)
                    .unwrap_or(self.policy.retries)
            };
            let delay = overrides
                .as_ref()
                .and_then(|o| o.delay.clone())
                .unwrap_or_else(|| self.policy.delay.clone());
            let retry_on = overrides
                .as_ref()
                .and_then(|o| o.retry_on.clone())
                .or_else(|| self.policy.retry_on.clone());

            let mut attempt: u32 = 0;
            loop {
                ctx.set_attempt(attempt);
                next.rewind();
                match next.run(request.clone(), ctx).await {
                    Ok(response) => return Ok(response),
                    Err(error) => {
                        if attempt >= retries {
                            return Err(error);
                        }
                        if let Some(predicate) = &retry_on {
                            if !predicate(&error, &request, ctx) {
                                return Err(error);
                            }
                        }
                        let wait = delay.duration_for(attempt + 1, &error, &request, ctx);
                        tracing::debug!(
                            call = %ctx.id(),
                            attempt = attempt + 1,
                            delay = ?wait,
                            error = %error,
                            "retrying request"
                        );
                        if wait > Duration::ZERO {
                            tokio::time::sleep(wait).await;
                        }
                        attempt += 1;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_middleware::{Pipeline, Terminal};
    use http::{Method, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    /// Fails the first `failures` invocations, then succeeds.
    struct FlakyTerminal {
        failures: usize,
        calls: Arc<AtomicUsize>,
    }

    impl Terminal for FlakyTerminal {
        fn invoke<'a>(
            &'a self,
            request: Request,
            _ctx: &'a mut Context,
        ) -> BoxFuture<'a, Result<Response>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call < self.failures {
                    Err(Error::network("flaky"))
                } else {
                    Ok(Response::builder(StatusCode::OK, request.url()).build())
                }
            })
        }
    }

    fn request() -> Request {
        Request::builder(Method::GET, "https://example.com").build()
    }

    fn pipeline(policy: RetryPolicy) -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline.push(RetryMiddleware::new(policy));
        pipeline
    }

    #[tokio::test]
    async fn two_failures_then_success_with_budget_two() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = FlakyTerminal { failures: 2, calls: calls.clone() };

        let mut ctx = Context::new(CancellationToken::new());
        let response = pipeline(RetryPolicy::new(2))
            .dispatch(request(), &mut ctx, &terminal)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(ctx.attempt(), 2);
    }

    #[tokio::test]
    async fn budget_one_is_not_enough_for_two_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = FlakyTerminal { failures: 2, calls: calls.clone() };

        let mut ctx = Context::new(CancellationToken::new());
        let err = pipeline(RetryPolicy::new(1))
            .dispatch(request(), &mut ctx, &terminal)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Network { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn predicate_rejects_and_stops_retrying() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = FlakyTerminal { failures: 10, calls: calls.clone() };

        let policy = RetryPolicy::new(2)
            .with_retry_on(Arc::new(|_error, _request, ctx| ctx.attempt() == 0));

        let mut ctx = Context::new(CancellationToken::new());
        let err = pipeline(policy)
            .dispatch(request(), &mut ctx, &terminal)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Network { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_waits_between_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = FlakyTerminal { failures: 1, calls: calls.clone() };

        let started = tokio::time::Instant::now();
        let mut ctx = Context::new(CancellationToken::new());
        pipeline(RetryPolicy::new(1).with_delay(Duration::from_millis(50)))
            .dispatch(request(), &mut ctx, &terminal)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn backoff_receives_the_upcoming_attempt_number() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = FlakyTerminal { failures: 2, calls: calls.clone() };
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let policy = RetryPolicy::new(2).with_backoff({
            let seen = seen.clone();
            Arc::new(move |attempt, _error, _request, _ctx| {
                seen.lock().unwrap().push(attempt);
                Duration::ZERO
            })
        });

        let mut ctx = Context::new(CancellationToken::new());
        pipeline(policy)
            .dispatch(request(), &mut ctx, &terminal)
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn metadata_override_disables_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = FlakyTerminal { failures: 10, calls: calls.clone() };

        let request = Request::builder(Method::GET, "https://example.com")
            .extension(RetryOverride::disabled())
            .build();

        let mut ctx = Context::new(CancellationToken::new());
        let err = pipeline(RetryPolicy::new(2))
            .dispatch(request, &mut ctx, &terminal)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Network { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn metadata_override_replaces_the_budget() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = FlakyTerminal { failures: 10, calls: calls.clone() };

        let request = Request::builder(Method::GET, "https://example.com")
            .extension(RetryOverride::retries(0))
            .build();

        let mut ctx = Context::new(CancellationToken::new());
        let err = pipeline(RetryPolicy::new(2))
            .dispatch(request, &mut ctx, &terminal)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Network { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
