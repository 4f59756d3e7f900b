//! Request execution engine.
//!
//! This module provides the pieces that drive a request from construction
//! to its single settlement:
//!
//! - **Compose middleware** into an onion around a terminal handler
//! - **Track the lifecycle** of a request (start, open, settle)
//! - **Abort and time out** cooperatively, exactly once
//! - **Report progress** of uploads and downloads
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── dispatch  - Middleware, Next, Handler and Compose
//! ├── lifecycle - phase machine, abort signal, progress counters, listeners
//! ├── config    - Client configuration
//! └── fetch     - Client and per-method request builders
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Request factory over a shared transport |
//! | [`ClientConfig`] | Client configuration options |
//! | [`Middleware`] | One step of the request pipeline |
//! | [`Compose`] | Middleware chain bound to a terminal [`Handler`] |
//! | [`Lifecycle`] | Shared state of one logical request |
//! | [`Progress`] | Snapshot of the transfer counters |
//!
//! # Examples
//!
//! ## Creating a Client
//!
//! ```
//! use relay_http::client::{Client, ClientConfig};
//!
//! // Default configuration
//! let client = Client::new();
//!
//! // Custom configuration
//! let config = ClientConfig {
//!     max_redirects: 10,
//!     request_timeout_ms: 2000,
//!     ..Default::default()
//! };
//! let client = Client::with_config(config);
//! ```
//!
//! ## Writing Middleware
//!
//! ```
//! use relay_http::client::{Middleware, Next};
//! use relay_http::{Request, Response, Result};
//! use async_trait::async_trait;
//!
//! struct RequestId;
//!
//! #[async_trait]
//! impl Middleware for RequestId {
//!     async fn handle(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
//!         let id = req.id().to_string();
//!         req.set("X-Request-Id", id);
//!         next.run(req).await
//!     }
//! }
//! ```

mod config;
pub(crate) mod dispatch;
mod fetch;
pub(crate) mod lifecycle;

pub use config::ClientConfig;
pub use dispatch::{Compose, Handler, Middleware, Next};
pub use fetch::Client;
pub use lifecycle::{
    AbortListener, Lifecycle, Phase, Progress, ProgressListener, ProgressReporter,
    RedirectListener,
};
