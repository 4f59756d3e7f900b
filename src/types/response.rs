//! The response entity.

use crate::error::{Error, ErrorCode};
use crate::protocol::Headers;
use crate::types::{Body, RequestJson};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Serializable snapshot of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseJson {
    /// Final URL, after redirects
    pub url: String,
    /// Status code
    pub status: u16,
    /// Reason phrase
    pub status_text: String,
    /// Merged headers keyed by original-case name
    pub headers: BTreeMap<String, String>,
    /// Body rendering
    pub body: serde_json::Value,
}

/// Result of a completed transport call, post-processed by middleware.
#[derive(Debug, Clone, Default)]
pub struct Response {
    status: u16,
    reason: Option<String>,
    headers: Headers,
    body: Body,
    url: String,
    request: Option<Arc<RequestJson>>,
}

impl Response {
    /// Create a response with `status`, no headers and an empty body.
    pub fn new(status: u16) -> Self {
        Response {
            status,
            ..Default::default()
        }
    }

    /// Reason phrase sent by the server, when it differs from the canonical
    /// one.
    pub fn with_status_text(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Append a header
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replace all headers
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Reason phrase as sent by the server, falling back to the canonical
    /// one; empty for unregistered codes without a phrase.
    pub fn status_text(&self) -> &str {
        match &self.reason {
            Some(reason) => reason,
            None => http::StatusCode::from_u16(self.status)
                .ok()
                .and_then(|status| status.canonical_reason())
                .unwrap_or(""),
        }
    }

    /// Status class, `status / 100`
    pub fn status_type(&self) -> u16 {
        self.status / 100
    }

    /// `true` for 2xx
    pub fn ok(&self) -> bool {
        self.status_type() == 2
    }

    /// Header container
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable header container
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Merged header value
    pub fn get(&self, name: &str) -> Option<String> {
        self.headers.get(name)
    }

    /// Media type of the `Content-Type` header
    pub fn content_type(&self) -> Option<&str> {
        self.headers.content_type()
    }

    /// Body
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Mutable body
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Replace the body
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Body as text; `None` for streams.
    pub fn text(&self) -> Option<String> {
        self.body.as_text()
    }

    /// URL that produced this response
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Snapshot of the request that produced this response.
    pub fn request(&self) -> Option<&RequestJson> {
        self.request.as_deref()
    }

    pub(crate) fn set_request(&mut self, request: RequestJson) {
        self.request = Some(Arc::new(request));
    }

    /// Build an error attributed to the originating request.
    pub fn error(&self, code: ErrorCode, message: impl Into<String>) -> Error {
        let err = Error::new(code, message);
        match &self.request {
            Some(request) => err.with_request(RequestJson::clone(request)),
            None => err,
        }
    }

    /// JSON snapshot
    pub fn to_json(&self) -> ResponseJson {
        ResponseJson {
            url: self.url.clone(),
            status: self.status,
            status_text: self.status_text().to_string(),
            headers: self.headers.to_map(),
            body: self.body.to_json_value(),
        }
    }
}
