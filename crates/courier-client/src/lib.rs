//! # Courier Client
//!
//! The request client orchestrator and default collaborators.
//!
//! ```rust,ignore
//! use courier_client::Client;
//! use courier_core::Query;
//!
//! let client = Client::builder()
//!     .base_url("https://api.example.com")
//!     .build()?;
//!
//! let user = client
//!     .get("/user")
//!     .query(Query::map([("id", 42)]))
//!     .send()
//!     .await?
//!     .json::<User>()?;
//! ```

#![doc(html_root_url = "https://docs.rs/courier-client/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod call;
mod client;
pub mod defaults;

pub use call::CallBuilder;
pub use client::{Client, ClientBuilder, Plugin};
