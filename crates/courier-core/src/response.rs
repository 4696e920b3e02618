//! The immutable response value.

use crate::error::{Error, Result};
use crate::meta::ResponseMeta;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;

/// How a response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// Parse the body as JSON.
    Json,
    /// Decode the body as UTF-8 text.
    Text,
    /// Keep the body as raw bytes, exposed as decoded data.
    Binary,
    /// No decoding; only the raw payload is kept.
    Raw,
}

impl ResponseKind {
    /// Returns the kind as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The decoded response data, shaped by the negotiated [`ResponseKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    /// Parsed JSON.
    Json(serde_json::Value),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes surfaced as data.
    Binary(Bytes),
}

impl DecodedBody {
    /// Returns the decoded JSON value, if the body was decoded as JSON.
    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the decoded text, if the body was decoded as text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the decoded bytes, if the body was kept binary.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// An immutable decoded response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    url: String,
    data: Option<DecodedBody>,
    raw: Bytes,
    meta: ResponseMeta,
}

impl Response {
    /// Starts building a response; used by decoders and tests.
    #[must_use]
    pub fn builder(status: StatusCode, url: impl Into<String>) -> ResponseBuilder {
        ResponseBuilder {
            status,
            url: url.into(),
            headers: HeaderMap::new(),
            data: None,
            raw: Bytes::new(),
            meta: ResponseMeta::new(),
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns an independent copy of the header set.
    ///
    /// Same copy-on-read invariant as [`crate::Request::headers`].
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    /// Returns a single header value.
    #[must_use]
    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Returns the resolved URL the response came from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the decoded data, if the negotiated kind produced any.
    #[must_use]
    pub fn data(&self) -> Option<&DecodedBody> {
        self.data.as_ref()
    }

    /// Returns the raw transport payload.
    #[must_use]
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Returns the response metadata.
    #[must_use]
    pub fn meta(&self) -> &ResponseMeta {
        &self.meta
    }

    /// Deserializes the response into a typed value.
    ///
    /// Uses the decoded JSON value when present, otherwise parses the raw
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let outcome = match &self.data {
            Some(DecodedBody::Json(value)) => serde_json::from_value(value.clone()),
            _ => serde_json::from_slice(&self.raw),
        };
        outcome.map_err(|err| Error::decode(ResponseKind::Json, self.status, &self.url, err))
    }
}

/// Builder for [`Response`].
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    status: StatusCode,
    url: String,
    headers: HeaderMap,
    data: Option<DecodedBody>,
    raw: Bytes,
    meta: ResponseMeta,
}

impl ResponseBuilder {
    /// Sets the header map.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the decoded data.
    #[must_use]
    pub fn data(mut self, data: DecodedBody) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the raw payload.
    #[must_use]
    pub fn raw(mut self, raw: Bytes) -> Self {
        self.raw = raw;
        self
    }

    /// Sets the response metadata.
    #[must_use]
    pub fn meta(mut self, meta: ResponseMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Builds the immutable response.
    #[must_use]
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            url: self.url,
            data: self.data,
            raw: self.raw,
            meta: self.meta,
        }
    }
}
