//! # Courier Core
//!
//! Core types and collaborator contracts for the Courier HTTP client.
//!
//! This crate provides the foundational pieces the rest of the workspace is
//! built on:
//!
//! - [`Request`] / [`Response`] - immutable value types with copy-on-read
//!   header access
//! - [`Context`] - per-call context with the typed coordination [`Bag`]
//! - [`Error`] - the single tagged error taxonomy
//! - [`contract`] - the pluggable collaborator traits (resolver, serializer,
//!   transport, decoder, error mapper)
//! - [`EventBus`] - the best-effort lifecycle event bus

#![doc(html_root_url = "https://docs.rs/courier-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod body;
mod context;
pub mod contract;
mod error;
mod events;
mod meta;
mod query;
mod request;
mod response;

pub use body::Body;
pub use context::{Bag, CallId, Context, TimedOut};
pub use contract::{
    BodySerializer, EncodedBody, ErrorMapper, ResponseDecoder, Transport, TransportResult,
    UrlResolver,
};
pub use error::{BodyPreview, Cause, Error, ErrorKind, Result};
pub use events::{EventBus, EventKind, ListenerId, RequestEvent};
pub use meta::{
    Extensions, ProgressCallback, ProgressDirection, ProgressInfo, RequestMeta, ResponseMeta,
};
pub use query::{Query, QueryValue};
pub use request::{HeaderPatch, Request, RequestBuilder};
pub use response::{DecodedBody, Response, ResponseBuilder, ResponseKind};
