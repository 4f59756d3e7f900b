#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Relay: a composable HTTP client
//!
//! This crate implements an HTTP client around a small request execution
//! engine: a middleware pipeline, a cancellable request lifecycle and a
//! redirect policy engine, on top of a pluggable transport.
//!
//! ## Overview
//!
//! A request travels through two pipelines:
//!
//! 1. **Request middleware** - by default `stringify` then `headers`, supplied
//!    by the transport; ends in the `Open` handler which validates the URL and
//!    opens the transport
//! 2. **Transport pipeline** - `User-Agent`, `Accept-Encoding`, then the
//!    redirect engine driving `cookies` and the network exchange once per hop
//!
//! Control unwinds back through both pipelines, so every middleware can
//! post-process the response.
//!
//! ## Key Features
//!
//! - **Onion middleware**: pre-`next` code runs in order, post-`next` code in
//!   reverse; `next` may run at most once
//! - **Exactly-once settlement**: the chain races the abort signal and an
//!   optional timeout; first settlement wins
//! - **Idempotent abort** from any task through an [`AbortHandle`]
//! - **Progress events** for uploads and downloads
//! - **Redirect table**: `301`/`302`/`303` become `GET`, `307`/`308` keep the
//!   method and need confirmation for unsafe methods
//! - **Cookies per hop** through a shared [`CookieJar`]
//! - **Stable error codes**: `EABORT`, `ETIMEOUT`, `EINVALID`,
//!   `EUNAVAILABLE`, `EMAXREDIRECTS`, `EPARSE`, `ESTRINGIFY`, ...
//!
//! ## Client Usage
//!
//! ```ignore
//! use relay_http::{Client, ErrorCode};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new();
//!
//!     let req = client
//!         .get("http://localhost:3000/redirect")
//!         .timeout(Duration::from_millis(500))
//!         .build();
//!     req.on_redirect(|url| println!("redirected to {}", url));
//!
//!     match req.await {
//!         Ok(res) => println!("{} {:?}", res.status(), res.text()),
//!         Err(e) if e.code() == ErrorCode::Timeout => eprintln!("too slow"),
//!         Err(e) => eprintln!("{} ({})", e, e.code()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[types]** - Request, response and body types
//! - **[error]** - Error types and result handling
//! - **[client]** - Middleware composition, lifecycle and the [`Client`]
//! - **[middleware]** - Built-in middleware and the redirect engine
//! - **[transport]** - Transport contract and the `reqwest` transport
//! - **[cookies]** - Cookie jar contract and in-memory jar
//! - **[protocol]** - Header container, constants, redirect table

pub mod client;
pub mod cookies;
pub mod error;
pub mod middleware;
pub mod protocol;
pub mod transport;
pub mod types;

pub use client::{Client, ClientConfig, Compose, Handler, Middleware, Next, Phase, Progress};
pub use cookies::{CookieJar, MemoryCookieJar};
pub use error::{BoxError, Error, ErrorCode, Result};
pub use protocol::Headers;
pub use transport::{HttpTransport, HttpTransportBuilder, Transport};
pub use types::{AbortHandle, Body, Request, RequestBuilder, RequestJson, Response, ResponseJson};

#[cfg(test)]
mod tests;
