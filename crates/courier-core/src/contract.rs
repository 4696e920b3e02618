//! Collaborator contracts.
//!
//! The client consumes its pluggable dependencies through these narrow
//! traits: resolve a URL, encode a body, send over the wire, decode the
//! result, classify a failure. Each takes the immutable request plus the
//! per-call context and nothing else, so any one collaborator can be replaced
//! without touching the rest.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::request::{HeaderPatch, Request};
use crate::response::Response;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// What a transport hands back: the wire-level result before decoding.
#[derive(Debug, Clone)]
pub struct TransportResult {
    /// Response status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// The URL the response actually came from.
    pub url: String,
    /// The raw response payload.
    pub body: Bytes,
}

/// An encoded request body plus header instructions.
///
/// The serializer never mutates the request; headers it wants attached (e.g.
/// a content type for JSON) come back as a patch the transport merges under
/// the request's own headers.
#[derive(Debug, Clone, Default)]
pub struct EncodedBody {
    /// The wire-ready payload, if the request has a body.
    pub payload: Option<Bytes>,
    /// Headers to attach unless the request already sets them.
    pub headers: HeaderPatch,
}

/// Resolves a request's target into a final absolute URL.
pub trait UrlResolver: Send + Sync {
    /// Returns the final URL for the request.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the request cannot be resolved (e.g. a relative
    /// path without a configured base URL).
    fn resolve(&self, request: &Request, ctx: &Context) -> Result<String>;
}

/// Encodes a request body into its wire form.
pub trait BodySerializer: Send + Sync {
    /// Encodes the request body.
    ///
    /// # Errors
    ///
    /// [`Error::Serialize`] when the body cannot be encoded; low-level
    /// encoder errors never escape raw.
    fn serialize(&self, request: &Request, ctx: &Context) -> Result<EncodedBody>;
}

/// Performs the network call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the wire-level result.
    ///
    /// Implementations must observe `ctx.cancellation()` and give up when it
    /// fires. Failures they cannot classify are wrapped as [`Error::Network`],
    /// the untyped bucket the error mapper reclassifies.
    async fn send(&self, request: &Request, ctx: &Context) -> Result<TransportResult>;
}

/// Turns a transport result into a decoded [`Response`] or a typed failure.
#[async_trait]
pub trait ResponseDecoder: Send + Sync {
    /// Decodes the transport result.
    ///
    /// # Errors
    ///
    /// [`Error::Http`] for statuses outside 2xx, [`Error::Decode`] when the
    /// body does not match the negotiated kind.
    async fn decode(
        &self,
        request: &Request,
        result: TransportResult,
        ctx: &Context,
    ) -> Result<Response>;
}

/// Classifies failures escaping the pipeline into the final typed error.
pub trait ErrorMapper: Send + Sync {
    /// Maps an error using the per-call context.
    ///
    /// Already-specific errors must pass through unchanged; only the untyped
    /// bucket is reclassified.
    fn map(&self, error: Error, request: &Request, ctx: &Context) -> Error;
}
