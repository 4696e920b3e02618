//! # Courier Middleware
//!
//! Onion middleware pipeline for the Courier HTTP client.
//!
//! A [`Pipeline`] holds an ordered list of [`Middleware`] stages and
//! dispatches each call through them around a [`Terminal`] handler. Each
//! stage's before-code runs in registration order and its after-code in
//! reverse order; the terminal runs exactly once at the center.

#![doc(html_root_url = "https://docs.rs/courier-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod middleware;
mod pipeline;

pub use middleware::{BoxFuture, FnMiddleware, Middleware, Next, Terminal};
pub use pipeline::Pipeline;
