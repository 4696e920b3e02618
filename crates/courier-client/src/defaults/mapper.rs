//! Default error mapper.

use courier_core::{Context, Error, ErrorMapper, Request, TimedOut};
use std::sync::Arc;

/// Classifies failures escaping the pipeline.
///
/// Precedence: already-specific errors pass through unchanged; a
/// [`Error::Network`] (the untyped bucket the default transport wraps raw
/// failures into) becomes [`Error::Timeout`] when the bag carries the
/// timed-out flag, [`Error::Canceled`] when the merged token fired, and stays
/// a network error otherwise. The flag check comes first — timeout and user
/// cancel ride the same token, and only the flag written before the timeout
/// abort tells them apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorMapper;

impl DefaultErrorMapper {
    /// Creates the mapper.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ErrorMapper for DefaultErrorMapper {
    fn map(&self, error: Error, _request: &Request, ctx: &Context) -> Error {
        match error {
            Error::Network { message, cause } => {
                let original = Error::Network { message, cause };
                if ctx.bag().contains::<TimedOut>() {
                    Error::Timeout {
                        cause: Some(Arc::new(original)),
                    }
                } else if ctx.cancellation().is_cancelled() {
                    Error::Canceled {
                        cause: Some(Arc::new(original)),
                    }
                } else {
                    original
                }
            }
            typed => typed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, StatusCode};
    use tokio_util::sync::CancellationToken;

    fn request() -> Request {
        Request::builder(Method::GET, "https://example.com").build()
    }

    #[test]
    fn timed_out_flag_wins_over_cancellation() {
        let token = CancellationToken::new();
        let ctx = Context::new(token.clone());
        ctx.bag().insert(TimedOut);
        token.cancel();

        let mapped = DefaultErrorMapper::new().map(Error::network("aborted"), &request(), &ctx);
        assert!(mapped.is_timeout());
        assert!(mapped.cause().is_some());
    }

    #[test]
    fn cancellation_without_flag_is_canceled() {
        let token = CancellationToken::new();
        let ctx = Context::new(token.clone());
        token.cancel();

        let mapped = DefaultErrorMapper::new().map(Error::network("aborted"), &request(), &ctx);
        assert!(mapped.is_canceled());
    }

    #[test]
    fn plain_network_errors_stay_network() {
        let ctx = Context::new(CancellationToken::new());
        let mapped = DefaultErrorMapper::new().map(Error::network("refused"), &request(), &ctx);
        assert!(matches!(mapped, Error::Network { .. }));
    }

    #[test]
    fn typed_errors_pass_through_even_when_cancelled() {
        let token = CancellationToken::new();
        let ctx = Context::new(token.clone());
        token.cancel();

        let original = Error::http(
            StatusCode::UNAUTHORIZED,
            "https://example.com",
            None,
            HeaderMap::new(),
        );
        let mapped = DefaultErrorMapper::new().map(original, &request(), &ctx);
        assert_eq!(mapped.status(), Some(StatusCode::UNAUTHORIZED));
    }
}
