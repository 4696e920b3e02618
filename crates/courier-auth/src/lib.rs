//! # Courier Auth
//!
//! Bearer-credential middleware for the Courier HTTP client: proactive
//! refresh before expiry, reactive refresh-and-retry on authentication
//! failures, and single-flight de-duplication of concurrent refreshes.
//!
//! The pieces compose around the [`TokenStore`] contract: supply any storage
//! medium behind it, a refresh operation, and register the middleware.
//!
//! ```rust,ignore
//! use courier_auth::{AuthMiddleware, AuthOptions, FreshToken, MemoryTokenStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryTokenStore::new());
//! let options = AuthOptions::new(store, Arc::new(|| {
//!     Box::pin(async {
//!         // call the issuer
//!         Ok(FreshToken { token: "...".into(), expires_at: None })
//!     })
//! }));
//! client.middleware(AuthMiddleware::new(options));
//! ```

#![doc(html_root_url = "https://docs.rs/courier-auth/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod controller;
mod middleware;
mod store;

pub use controller::{
    AuthController, AuthOptions, FreshToken, RefreshClassifier, RefreshFailedCallback, RefreshFn,
};
pub use middleware::AuthMiddleware;
pub use store::{MemoryTokenStore, TokenMeta, TokenRecord, TokenStore};
