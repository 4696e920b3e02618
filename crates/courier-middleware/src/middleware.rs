//! Core middleware trait and the `Next` continuation.
//!
//! Middlewares wrap the dispatch in onion order: code before `next.run` exe-
//! cutes outer-to-inner, code after it inner-to-outer, with the terminal
//! handler invoked exactly once at the center.
//!
//! # Invariants
//!
//! - A middleware may invoke `next` at most once per dispatch. The chain
//!   tracks a strictly monotonically increasing stage watermark; re-entering
//!   an already-passed stage is a programming error surfaced as
//!   [`Error::Config`](courier_core::Error) before the terminal handler can
//!   run a second time.
//! - Middlewares that legitimately re-dispatch the remainder of the chain
//!   (retry loops, refresh-and-retry) must call [`Next::rewind`] first. The
//!   rewind re-arms the watermark at their own stage, making the re-dispatch
//!   an explicit act instead of an accident.

use courier_core::{Context, Error, Request, Response, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A boxed future returned by middlewares and terminal handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The innermost handler of a dispatch: send over the transport, decode.
pub trait Terminal: Send + Sync {
    /// Invokes the terminal handler.
    fn invoke<'a>(&'a self, request: Request, ctx: &'a mut Context) -> BoxFuture<'a, Result<Response>>;
}

/// The core middleware trait.
///
/// A middleware receives the current request, the mutable per-call context
/// and a [`Next`] continuation. It must run `next` to proceed, or skip it to
/// short-circuit with its own result.
///
/// # Example
///
/// ```ignore
/// struct Logging;
///
/// impl Middleware for Logging {
///     fn name(&self) -> &'static str {
///         "logging"
///     }
///
///     fn handle<'a>(
///         &'a self,
///         request: Request,
///         ctx: &'a mut Context,
///         next: Next<'a>,
///     ) -> BoxFuture<'a, Result<Response>> {
///         Box::pin(async move {
///             tracing::debug!(call = %ctx.id(), url = request.url(), "dispatching");
///             let outcome = next.run(request, ctx).await;
///             tracing::debug!(call = %ctx.id(), ok = outcome.is_ok(), "done");
///             outcome
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this middleware, used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request through this middleware.
    fn handle<'a>(
        &'a self,
        request: Request,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response>>;
}

/// Watermark of the highest stage a dispatch has entered.
///
/// One dispatch never runs stages in parallel, so a plain load/store pair is
/// enough to detect re-entry.
#[derive(Debug, Default)]
pub(crate) struct StageGuard {
    watermark: AtomicUsize,
}

impl StageGuard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn enter(&self, index: usize) -> Result<()> {
        let watermark = self.watermark.load(Ordering::Acquire);
        if index < watermark {
            return Err(Error::config(format!(
                "pipeline stage {index} re-entered: next may be invoked at most once per stage"
            )));
        }
        self.watermark.store(index + 1, Ordering::Release);
        Ok(())
    }

    fn rewind(&self, index: usize) {
        self.watermark.store(index, Ordering::Release);
    }
}

/// Continuation into the remaining middleware chain.
///
/// Cheap to copy; the at-most-once invariant is enforced at run time by the
/// stage watermark, not by ownership, so a buggy double invocation fails
/// loudly instead of silently re-running inner stages.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    terminal: &'a dyn Terminal,
    guard: &'a StageGuard,
    index: usize,
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        stages: &'a [Arc<dyn Middleware>],
        terminal: &'a dyn Terminal,
        guard: &'a StageGuard,
    ) -> Self {
        Self {
            stages,
            terminal,
            guard,
            index: 0,
        }
    }

    /// Invokes the next middleware, or the terminal handler at the center.
    ///
    /// # Errors
    ///
    /// [`Error::Config`](courier_core::Error) when this stage was already
    /// passed — i.e. `next` was invoked more than once without a
    /// [`rewind`](Next::rewind).
    pub async fn run(&self, request: Request, ctx: &mut Context) -> Result<Response> {
        self.guard.enter(self.index)?;
        match self.stages.get(self.index) {
            Some(middleware) => {
                let next = Next {
                    index: self.index + 1,
                    ..*self
                };
                middleware.handle(request, ctx, next).await
            }
            None => self.terminal.invoke(request, ctx).await,
        }
    }

    /// Re-arms this continuation so the remaining chain can run again.
    ///
    /// This is the explicit affordance for middlewares that re-dispatch
    /// sequentially — a retry loop, a refresh-and-retry — and it resets the
    /// watermark to this stage only. Without it, a second `run` fails.
    pub fn rewind(&self) {
        self.guard.rewind(self.index);
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("stages", &self.stages.len())
            .finish()
    }
}

/// A middleware built from a function, for simple cases and tests.
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(Request, &'a mut Context, Next<'a>) -> BoxFuture<'a, Result<Response>>
        + Send
        + Sync
        + 'static,
{
    /// Creates a function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(Request, &'a mut Context, Next<'a>) -> BoxFuture<'a, Result<Response>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(
        &'a self,
        request: Request,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response>> {
        (self.func)(request, ctx, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use std::sync::atomic::AtomicUsize;
    use tokio_util::sync::CancellationToken;

    struct CountingTerminal {
        calls: Arc<AtomicUsize>,
    }

    impl Terminal for CountingTerminal {
        fn invoke<'a>(
            &'a self,
            request: Request,
            _ctx: &'a mut Context,
        ) -> BoxFuture<'a, Result<Response>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(Response::builder(StatusCode::OK, request.url()).build())
            })
        }
    }

    struct PassThrough;

    impl Middleware for PassThrough {
        fn name(&self) -> &'static str {
            "pass_through"
        }

        fn handle<'a>(
            &'a self,
            request: Request,
            ctx: &'a mut Context,
            next: Next<'a>,
        ) -> BoxFuture<'a, Result<Response>> {
            Box::pin(async move { next.run(request, ctx).await })
        }
    }

    struct DoubleNext;

    impl Middleware for DoubleNext {
        fn name(&self) -> &'static str {
            "double_next"
        }

        fn handle<'a>(
            &'a self,
            request: Request,
            ctx: &'a mut Context,
            next: Next<'a>,
        ) -> BoxFuture<'a, Result<Response>> {
            Box::pin(async move {
                let _ = next.run(request.clone(), ctx).await;
                next.run(request, ctx).await
            })
        }
    }

    fn test_request() -> Request {
        Request::builder(Method::GET, "https://example.com").build()
    }

    #[tokio::test]
    async fn next_reaches_the_terminal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = CountingTerminal { calls: calls.clone() };
        let stages: Vec<Arc<dyn Middleware>> = vec![Arc::new(PassThrough)];
        let guard = StageGuard::new();
        let next = Next::new(&stages, &terminal, &guard);

        let mut ctx = Context::new(CancellationToken::new());
        let response = next.run(test_request(), &mut ctx).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn double_next_fails_without_second_terminal_invocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = CountingTerminal { calls: calls.clone() };
        let stages: Vec<Arc<dyn Middleware>> = vec![Arc::new(DoubleNext)];
        let guard = StageGuard::new();
        let next = Next::new(&stages, &terminal, &guard);

        let mut ctx = Context::new(CancellationToken::new());
        let err = next.run(test_request(), &mut ctx).await.unwrap_err();

        assert!(matches!(err, Error::Config { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rewind_allows_sequential_redispatch() {
        struct RunTwice;

        impl Middleware for RunTwice {
            fn name(&self) -> &'static str {
                "run_twice"
            }

            fn handle<'a>(
                &'a self,
                request: Request,
                ctx: &'a mut Context,
                next: Next<'a>,
            ) -> BoxFuture<'a, Result<Response>> {
                Box::pin(async move {
                    next.rewind();
                    let _ = next.run(request.clone(), ctx).await?;
                    next.rewind();
                    next.run(request, ctx).await
                })
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = CountingTerminal { calls: calls.clone() };
        let stages: Vec<Arc<dyn Middleware>> = vec![Arc::new(RunTwice)];
        let guard = StageGuard::new();
        let next = Next::new(&stages, &terminal, &guard);

        let mut ctx = Context::new(CancellationToken::new());
        let response = next.run(test_request(), &mut ctx).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fn_middleware_wraps_closures() {
        fn noop<'a>(
            request: Request,
            ctx: &'a mut Context,
            next: Next<'a>,
        ) -> BoxFuture<'a, Result<Response>> {
            Box::pin(async move { next.run(request, ctx).await })
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let terminal = CountingTerminal { calls: calls.clone() };
        let middleware = FnMiddleware::new("noop", noop);
        assert_eq!(middleware.name(), "noop");

        let stages: Vec<Arc<dyn Middleware>> = vec![Arc::new(middleware)];
        let guard = StageGuard::new();
        let next = Next::new(&stages, &terminal, &guard);

        let mut ctx = Context::new(CancellationToken::new());
        let response = next.run(test_request(), &mut ctx).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
