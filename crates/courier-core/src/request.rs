//! The immutable request value.
//!
//! A [`Request`] is constructed once and never mutated in place. Deriving a
//! modified request (e.g. attaching an auth header) goes through
//! [`Request::to_builder`], which copies every field and applies the changes
//! before building a fresh value.

use crate::body::Body;
use crate::meta::RequestMeta;
use crate::query::Query;
use http::header::IntoHeaderName;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A header patch: explicit sets and explicit removals.
///
/// Assigning a value sets the header; an explicit removal deletes it.
/// Removals are applied before sets, so a patch that both removes and sets
/// the same name ends up set.
#[derive(Debug, Clone, Default)]
pub struct HeaderPatch {
    set: HeaderMap,
    removed: Vec<HeaderName>,
}

impl HeaderPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header value.
    #[must_use]
    pub fn set<K: IntoHeaderName>(mut self, key: K, value: HeaderValue) -> Self {
        self.set.insert(key, value);
        self
    }

    /// Marks a header for removal.
    #[must_use]
    pub fn remove(mut self, key: HeaderName) -> Self {
        self.removed.push(key);
        self
    }

    /// Applies this patch to a header map.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for name in &self.removed {
            headers.remove(name);
        }
        for (name, value) in &self.set {
            headers.insert(name.clone(), value.clone());
        }
    }

    /// Returns `true` when the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.removed.is_empty()
    }
}

impl From<HeaderMap> for HeaderPatch {
    fn from(headers: HeaderMap) -> Self {
        Self {
            set: headers,
            removed: Vec::new(),
        }
    }
}

/// An immutable request description.
///
/// The URL may be a path relative to the client's base URL until the resolver
/// has run; middlewares and the transport always observe the resolved,
/// absolute form.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    headers: HeaderMap,
    query: Option<Query>,
    body: Option<Body>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    meta: RequestMeta,
}

impl Request {
    /// Starts building a request.
    #[must_use]
    pub fn builder(method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query: None,
            body: None,
            timeout: None,
            cancel: None,
            meta: RequestMeta::new(),
        }
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the target URL or path.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns an independent copy of the header set.
    ///
    /// Every call returns a fresh map; mutating one copy never affects the
    /// request or a later copy.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    /// Returns a single header value.
    #[must_use]
    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Returns the query description, if any.
    #[must_use]
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Returns the body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Returns the per-call timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the caller's external cancellation token, if any.
    #[must_use]
    pub fn cancel(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Returns the request metadata.
    #[must_use]
    pub fn meta(&self) -> &RequestMeta {
        &self.meta
    }

    /// Copies this request into a builder for derivation.
    #[must_use]
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            query: self.query.clone(),
            body: self.body.clone(),
            timeout: self.timeout,
            cancel: self.cancel.clone(),
            meta: self.meta.clone(),
        }
    }
}

/// Builder for [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    url: String,
    headers: HeaderMap,
    query: Option<Query>,
    body: Option<Body>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    meta: RequestMeta,
}

impl RequestBuilder {
    /// Replaces the method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Replaces the URL or path.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets a header.
    #[must_use]
    pub fn header<K: IntoHeaderName>(mut self, key: K, value: HeaderValue) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Removes a header.
    #[must_use]
    pub fn remove_header(mut self, key: &HeaderName) -> Self {
        self.headers.remove(key);
        self
    }

    /// Applies a header patch.
    #[must_use]
    pub fn headers(mut self, patch: &HeaderPatch) -> Self {
        patch.apply(&mut self.headers);
        self
    }

    /// Replaces the whole header map.
    #[must_use]
    pub fn header_map(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
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
        self.body = Some(body);
        self
    }

    /// Sets the per-call timeout.
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

    /// Replaces the metadata.
    #[must_use]
    pub fn meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Stores a typed value in the metadata extension map.
    #[must_use]
    pub fn extension<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.meta.extensions_mut().insert(value);
        self
    }

    /// Builds the immutable request.
    #[must_use]
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            query: self.query,
            body: self.body,
            timeout: self.timeout,
            cancel: self.cancel,
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_accessor_returns_independent_copies() {
        let request = Request::builder(Method::GET, "https://example.com")
            .header("x-test", HeaderValue::from_static("1"))
            .build();

        let mut first = request.headers();
        first.insert("x-test", HeaderValue::from_static("2"));

        let second = request.headers();
        assert_eq!(second.get("x-test"), Some(&HeaderValue::from_static("1")));
    }

    #[test]
    fn derivation_supports_header_removal() {
        let request = Request::builder(Method::GET, "https://example.com")
            .header("x-test", HeaderValue::from_static("1"))
            .header("x-remove", HeaderValue::from_static("x"))
            .build();

        let patch = HeaderPatch::new().remove(HeaderName::from_static("x-remove"));
        let derived = request.to_builder().headers(&patch).build();

        assert_eq!(
            derived.header(&HeaderName::from_static("x-test")),
            Some(&HeaderValue::from_static("1"))
        );
        assert_eq!(derived.header(&HeaderName::from_static("x-remove")), None);

        // The original is untouched.
        assert_eq!(
            request.header(&HeaderName::from_static("x-remove")),
            Some(&HeaderValue::from_static("x"))
        );
    }

    #[test]
    fn patch_set_wins_over_removal_of_same_name() {
        let mut headers = HeaderMap::new();
        headers.insert("x-a", HeaderValue::from_static("old"));

        let patch = HeaderPatch::new()
            .remove(HeaderName::from_static("x-a"))
            .set("x-a", HeaderValue::from_static("new"));
        patch.apply(&mut headers);

        assert_eq!(headers.get("x-a"), Some(&HeaderValue::from_static("new")));
    }

    #[test]
    fn derivation_keeps_unrelated_fields() {
        let token = CancellationToken::new();
        let request = Request::builder(Method::POST, "/user")
            .body(Body::text("payload"))
            .timeout(Duration::from_secs(3))
            .cancel(token)
            .build();

        let derived = request
            .to_builder()
            .url("https://api.example.com/user")
            .build();

        assert_eq!(derived.method(), &Method::POST);
        assert_eq!(derived.url(), "https://api.example.com/user");
        assert_eq!(derived.body(), Some(&Body::text("payload")));
        assert_eq!(derived.timeout(), Some(Duration::from_secs(3)));
        assert!(derived.cancel().is_some());
    }
}
