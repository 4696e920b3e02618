//! Per-call request builder.
//!
//! The ergonomic entry point: merges the client's defaults (headers, timeout,
//! metadata) with the per-call overrides, builds the immutable [`Request`]
//! and hands it to [`Client::execute`]. Header merge is override-wins; the
//! metadata merge is shallow override-wins.

use crate::client::Client;
use courier_core::{
    Body, HeaderPatch, ProgressCallback, Query, Request, RequestMeta, Response, ResponseKind,
    Result,
};
use http::header::IntoHeaderName;
use http::{HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Builder for one call.
#[derive(Debug)]
pub struct CallBuilder {
    client: Client,
    method: Method,
    url: String,
    headers: HeaderPatch,
    query: Option<Query>,
    body: Option<Result<Body>>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    meta: RequestMeta,
}

impl CallBuilder {
    pub(crate) fn new(client: Client, method: Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            headers: HeaderPatch::new(),
            query: None,
            body: None,
            timeout: None,
            cancel: None,
            meta: RequestMeta::new(),
        }
    }

    /// Sets a header, overriding any client default of the same name.
    #[must_use]
    pub fn header<K: IntoHeaderName>(mut self, key: K, value: HeaderValue) -> Self {
        self.headers = self.headers.set(key, value);
        self
    }

    /// Removes a header, including a client default of that name.
    #[must_use]
    pub fn remove_header(mut self, key: HeaderName) -> Self {
        self.headers = self.headers.remove(key);
        self
    }

    /// Sets the query description.
    #[must_use]
    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: Body) -> Self {
        self.body = Some(Ok(body));
        self
    }

    /// Sets a JSON body from a serializable value.
    ///
    /// An encoding failure is deferred and surfaces from [`send`](Self::send)
    /// as [`Error::Serialize`](courier_core::Error).
    #[must_use]
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        self.body = Some(Body::json(value));
        self
    }

    /// Sets the per-call timeout, overriding the client default.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attaches an external cancellation token.
    #[must_use]
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Overrides how the response body is decoded.
    #[must_use]
    pub fn response_kind(mut self, kind: ResponseKind) -> Self {
        self.meta.response_kind = Some(kind);
        self
    }

    /// Adds a metadata tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.meta.tags.push(tag.into());
        self
    }

    /// Stores a typed value in the metadata extension map.
    #[must_use]
    pub fn extension<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.meta.extensions_mut().insert(value);
        self
    }

    /// Registers a best-effort upload progress callback.
    #[must_use]
    pub fn on_upload_progress(mut self, callback: ProgressCallback) -> Self {
        self.meta.on_upload_progress = Some(callback);
        self
    }

    /// Registers a best-effort download progress callback.
    #[must_use]
    pub fn on_download_progress(mut self, callback: ProgressCallback) -> Self {
        self.meta.on_download_progress = Some(callback);
        self
    }

    /// Builds the request without executing it.
    ///
    /// # Errors
    ///
    /// A deferred body encoding failure.
    pub fn build(self) -> Result<Request> {
        let mut headers = self.client.default_headers().clone();
        self.headers.apply(&mut headers);
        let meta = self.client.default_meta().merged_with(&self.meta);
        let timeout = self.timeout.or_else(|| self.client.default_timeout());

        let body = match self.body {
            Some(Ok(body)) => Some(body),
            Some(Err(err)) => return Err(err),
            None => None,
        };

        let mut builder = Request::builder(self.method, self.url)
            .header_map(headers)
            .meta(meta);
        if let Some(query) = self.query {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(cancel) = self.cancel {
            builder = builder.cancel(cancel);
        }
        Ok(builder.build())
    }

    /// Builds the request and executes it.
    pub async fn send(self) -> Result<Response> {
        let client = self.client.clone();
        let request = self.build()?;
        client.execute(request).await
    }
}
