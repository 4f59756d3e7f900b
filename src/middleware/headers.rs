//! Header defaults.

use crate::client::{Middleware, Next};
use crate::error::{ErrorCode, Result};
use crate::protocol::constants::{headers, DEFAULT_ACCEPT_ENCODING};
use crate::types::{Body, Request, Response};
use async_trait::async_trait;
use std::sync::Arc;

struct DefaultHeaders;

#[async_trait]
impl Middleware for DefaultHeaders {
    async fn handle(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        if !req.headers().has(headers::ACCEPT) {
            req.set(headers::ACCEPT, "*/*");
        }

        // The transport derives Host from the URL.
        req.headers_mut().remove(headers::HOST);

        match req.body() {
            Body::Json(_) | Body::Form(_) => {
                return Err(req.error(ErrorCode::Body, "Argument error, `options.body`"));
            }
            Body::Stream(_) => {
                if !req.headers().has(headers::CONTENT_LENGTH) {
                    req.set(headers::TRANSFER_ENCODING, "chunked");
                }
            }
            body => {
                if let Some(length) = body.len().filter(|len| *len > 0) {
                    if !req.headers().has(headers::CONTENT_LENGTH) {
                        req.set(headers::CONTENT_LENGTH, length.to_string());
                    }
                }
            }
        }

        next.run(req).await
    }
}

/// `Accept: */*` unless set, drop any `Host`, and describe the body length.
///
/// Text and byte bodies get `Content-Length`, streams get
/// `Transfer-Encoding: chunked`. Structured bodies that `stringify` could not
/// encode fail with `EBODY`.
pub fn headers() -> Arc<dyn Middleware> {
    Arc::new(DefaultHeaders)
}

struct UserAgent {
    agent: String,
}

#[async_trait]
impl Middleware for UserAgent {
    async fn handle(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        if !req.headers().has(headers::USER_AGENT) {
            req.set(headers::USER_AGENT, self.agent.clone());
        }
        next.run(req).await
    }
}

/// Default `User-Agent`
pub fn user_agent(agent: impl Into<String>) -> Arc<dyn Middleware> {
    Arc::new(UserAgent {
        agent: agent.into(),
    })
}

struct ContentEncoding;

#[async_trait]
impl Middleware for ContentEncoding {
    async fn handle(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        if !req.headers().has(headers::ACCEPT_ENCODING) {
            req.set(headers::ACCEPT_ENCODING, DEFAULT_ACCEPT_ENCODING);
        }
        next.run(req).await
    }
}

/// Advertise compressed encodings. Decoding happens in the transport.
pub fn content_encoding() -> Arc<dyn Middleware> {
    Arc::new(ContentEncoding)
}
