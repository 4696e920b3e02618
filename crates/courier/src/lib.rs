//! # Courier
//!
//! **Extensible async HTTP request client**
//!
//! Courier turns a declarative request description into a decoded response
//! through a pipeline of pluggable pieces:
//!
//! - **Value objects** – immutable [`Request`](courier_core::Request) /
//!   [`Response`](courier_core::Response) with copy-on-read headers
//! - **Collaborators** – URL resolver, body serializer, transport, response
//!   decoder and error mapper, each replaceable on its own
//! - **Onion middlewares** – before-code outer-to-inner, after-code
//!   inner-to-outer, including bounded retry and single-flight token refresh
//! - **Typed errors** – one exhaustive taxonomy; timeouts, cancellations,
//!   HTTP failures and network failures are always distinguishable
//! - **Lifecycle events** – `request:start` then exactly one of `end`,
//!   `error` or `abort` per call
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> courier::core::Result<()> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")
//!         .timeout(Duration::from_secs(10))
//!         .build()?;
//!     client.middleware(RetryMiddleware::new(RetryPolicy::new(2)));
//!
//!     let user: serde_json::Value = client
//!         .get("/user")
//!         .query(Query::map([("id", 42)]))
//!         .send()
//!         .await?
//!         .json()?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/courier/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use courier_core as core;

// Re-export the middleware pipeline
pub use courier_middleware as middleware;

// Re-export the client orchestrator and default collaborators
pub use courier_client as client;

// Re-export the retry middleware
pub use courier_retry as retry;

// Re-export the auth middleware and token store contract
pub use courier_auth as auth;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    pub use courier_core::{
        Body, Context, Error, ErrorKind, EventKind, Query, QueryValue, Request, RequestEvent,
        Response, ResponseKind, Result,
    };

    pub use courier_middleware::{Middleware, Next, Pipeline};

    pub use courier_client::{CallBuilder, Client, ClientBuilder, Plugin};

    pub use courier_retry::{RetryMiddleware, RetryOverride, RetryPolicy};

    pub use courier_auth::{
        AuthController, AuthMiddleware, AuthOptions, FreshToken, MemoryTokenStore, TokenStore,
    };
}
