//! Error types for Courier.
//!
//! Every failure a caller can observe is one variant of [`Error`]: a single
//! tagged enum rather than a class hierarchy, so call sites can match
//! exhaustively. Each variant carries an optional underlying cause.
//!
//! Causes are stored as `Arc<dyn Error>` so the whole type is [`Clone`]. This
//! matters for the single-flight token refresh: one failed refresh must be
//! delivered to every concurrent waiter.

use crate::response::ResponseKind;
use http::{HeaderMap, StatusCode};
use std::sync::Arc;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shared underlying cause of an [`Error`].
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Best-effort preview of a non-2xx response body.
///
/// JSON when the content type says so, otherwise text. Absent when the body
/// could not be read or parsed — preview failures never mask the HTTP error
/// itself.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyPreview {
    /// Parsed JSON body.
    Json(serde_json::Value),
    /// Plain text body.
    Text(String),
}

impl BodyPreview {
    /// Returns the preview as JSON, if it was parsed as such.
    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Returns the preview as text, if it was captured as such.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }
}

/// Coarse classification of an [`Error`], usable as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Generic transport failure.
    Network,
    /// The per-call timer fired before completion.
    Timeout,
    /// The external cancellation signal aborted the call.
    Canceled,
    /// The server answered with a status outside 2xx.
    Http,
    /// Invalid client configuration.
    Config,
    /// The request body could not be encoded.
    Serialize,
    /// The response body could not be decoded into the negotiated kind.
    Decode,
}

impl ErrorKind {
    /// Returns the kind as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Canceled => "canceled",
            Self::Http => "http",
            Self::Config => "config",
            Self::Serialize => "serialize",
            Self::Decode => "decode",
        }
    }
}

/// Standard error type for Courier.
///
/// Collaborators raise the most specific applicable variant directly; the
/// error mapper only reclassifies the untyped bucket ([`Error::Network`])
/// using the per-call context. Callers never see a raw transport error.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Generic transport failure.
    ///
    /// This is also the wrapper for raw errors escaping the transport; the
    /// default error mapper turns it into [`Error::Timeout`] or
    /// [`Error::Canceled`] when the call context says so.
    #[error("network error: {message}")]
    Network {
        /// Human-readable error message.
        message: String,
        /// The underlying error, if any.
        #[source]
        cause: Option<Cause>,
    },

    /// The per-call timer fired before the call completed.
    #[error("request timed out")]
    Timeout {
        /// The underlying error, if any.
        #[source]
        cause: Option<Cause>,
    },

    /// The caller's cancellation signal aborted the call.
    #[error("request canceled")]
    Canceled {
        /// The underlying error, if any.
        #[source]
        cause: Option<Cause>,
    },

    /// The server answered with a status outside `[200, 300)`.
    #[error("HTTP {status} for {url}")]
    Http {
        /// Response status code.
        status: StatusCode,
        /// The resolved URL that was requested.
        url: String,
        /// Best-effort body preview.
        preview: Option<BodyPreview>,
        /// Response headers.
        headers: HeaderMap,
        /// The underlying error, if any.
        #[source]
        cause: Option<Cause>,
    },

    /// Invalid client configuration (e.g. a relative URL without a base).
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
        /// The underlying error, if any.
        #[source]
        cause: Option<Cause>,
    },

    /// The request body could not be encoded.
    #[error("failed to serialize request body: {message}")]
    Serialize {
        /// Human-readable error message.
        message: String,
        /// The underlying error, if any.
        #[source]
        cause: Option<Cause>,
    },

    /// The response body could not be decoded into the negotiated kind.
    #[error("failed to decode response body as {kind} (HTTP {status} for {url})")]
    Decode {
        /// The response kind that was attempted.
        kind: ResponseKind,
        /// Response status code.
        status: StatusCode,
        /// The resolved URL that was requested.
        url: String,
        /// The underlying error, if any.
        #[source]
        cause: Option<Cause>,
    },
}

impl Error {
    /// Creates a network error with a message.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a network error with an underlying cause.
    pub fn network_with_cause(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(cause: Option<Cause>) -> Self {
        Self::Timeout { cause }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn canceled(cause: Option<Cause>) -> Self {
        Self::Canceled { cause }
    }

    /// Creates an HTTP status error.
    #[must_use]
    pub fn http(
        status: StatusCode,
        url: impl Into<String>,
        preview: Option<BodyPreview>,
        headers: HeaderMap,
    ) -> Self {
        Self::Http {
            status,
            url: url.into(),
            preview,
            headers,
            cause: None,
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a configuration error with an underlying cause.
    pub fn config_with_cause(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// Creates a serialization error with an underlying cause.
    pub fn serialize(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialize {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// Creates a decode error for the attempted response kind.
    pub fn decode(
        kind: ResponseKind,
        status: StatusCode,
        url: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Decode {
            kind,
            status,
            url: url.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Canceled { .. } => ErrorKind::Canceled,
            Self::Http { .. } => ErrorKind::Http,
            Self::Config { .. } => ErrorKind::Config,
            Self::Serialize { .. } => ErrorKind::Serialize,
            Self::Decode { .. } => ErrorKind::Decode,
        }
    }

    /// Returns the HTTP status for [`Error::Http`] and [`Error::Decode`].
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } | Self::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for [`Error::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` for [`Error::Canceled`].
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }

    /// Returns the underlying cause, if one was recorded.
    #[must_use]
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            Self::Network { cause, .. }
            | Self::Timeout { cause }
            | Self::Canceled { cause }
            | Self::Http { cause, .. }
            | Self::Config { cause, .. }
            | Self::Serialize { cause, .. }
            | Self::Decode { cause, .. } => cause.as_ref(),
        }
    }
}
