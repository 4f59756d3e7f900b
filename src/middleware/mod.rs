//! Built-in middleware.
//!
//! | Middleware | Runs | Purpose |
//! |------------|------|---------|
//! | [`stringify`] | request chain | encode [`Body::Json`](crate::Body::Json) and [`Body::Form`](crate::Body::Form) |
//! | [`headers`] | request chain | `Accept`, `Host` removal, body length headers |
//! | [`parse`] | opt-in | decode JSON and URL-encoded responses |
//! | [`user_agent`] | transport | default `User-Agent` |
//! | [`content_encoding`] | transport | `Accept-Encoding` negotiation |
//! | [`cookies`] | each redirect hop | read and store cookies through a [`CookieJar`](crate::CookieJar) |
//!
//! [`Redirects`] is not a middleware but a [`Handler`](crate::client::Handler)
//! wrapping the per-hop pipeline, since it has to drive that pipeline more
//! than once.

mod body;
mod cookies;
mod headers;
mod redirects;

pub use body::{parse, stringify, ParseType};
pub use cookies::cookies;
pub use headers::{content_encoding, headers, user_agent};
pub use redirects::{ConfirmRedirect, Redirects};
