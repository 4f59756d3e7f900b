//! The request entity.
//!
//! A [`Request`] is built in two phases. [`RequestBuilder::build`] returns a
//! request that has not started, so middleware and listeners can still be
//! attached; [`Request::send`] (or awaiting the request, or
//! [`Request::exec`]) starts it. Once started, attaching middleware or
//! sending again fails with `ESTARTED`.
//!
//! # Examples
//!
//! ```ignore
//! use relay_http::{Request, Body};
//! use std::time::Duration;
//!
//! let mut req = Request::builder("http://localhost:3000/echo")
//!     .method("POST")
//!     .header("X-Request-Id", "42")
//!     .json(serde_json::json!({ "name": "relay" }))
//!     .timeout(Duration::from_secs(5))
//!     .build();
//!
//! req.on_progress(|p| {
//!     println!("{:.0}%", p.completed() * 100.0);
//!     Ok(())
//! });
//!
//! let abort = req.abort_handle();
//! let res = req.await?;
//! ```

use crate::client::dispatch::{Compose, Handler, Middleware};
use crate::client::lifecycle::{Lifecycle, Phase, Progress, ProgressReporter};
use crate::error::{BoxError, Error, ErrorCode, Result};
use crate::protocol::Headers;
use crate::transport::{HttpTransport, Open, Transport};
use crate::types::{Body, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Serializable snapshot of a request, attached to errors and responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestJson {
    /// Request URL
    pub url: String,
    /// Upper-case method
    pub method: String,
    /// Merged headers keyed by original-case name
    pub headers: BTreeMap<String, String>,
    /// Body rendering; `null` for empty and streaming bodies
    pub body: serde_json::Value,
    /// Timeout in milliseconds, `0` when disabled
    pub timeout: u64,
}

/// Builder for [`Request`].
pub struct RequestBuilder {
    url: String,
    method: String,
    headers: Headers,
    body: Body,
    timeout: u64,
    middleware: Option<Vec<Arc<dyn Middleware>>>,
    transport: Option<Arc<dyn Transport>>,
}

impl RequestBuilder {
    fn new(url: impl Into<String>) -> Self {
        RequestBuilder {
            url: url.into(),
            method: "GET".to_string(),
            headers: Headers::new(),
            body: Body::Empty,
            timeout: 0,
            middleware: None,
            transport: None,
        }
    }

    /// HTTP method; normalized to upper case.
    pub fn method(mut self, method: impl AsRef<str>) -> Self {
        self.method = method.as_ref().to_ascii_uppercase();
        self
    }

    /// Append a header
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replace all headers
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Request body
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Structured body, encoded by the `stringify` middleware.
    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    /// Form pairs, URL-encoded by the `stringify` middleware.
    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = Body::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Deadline for the whole send, including every redirect hop.
    ///
    /// A zero duration disables the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.as_millis() as u64;
        self
    }

    /// Timeout in milliseconds; `0` disables it.
    pub fn timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add request middleware.
    ///
    /// The first call replaces the transport's default middleware.
    pub fn use_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.get_or_insert_with(Vec::new).push(middleware);
        self
    }

    /// Transport that executes the request.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build a request that has not started yet.
    pub fn build(self) -> Request {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::default()));
        let middleware = self.middleware.unwrap_or_else(|| transport.middleware());

        Request {
            id: Uuid::new_v4(),
            url: self.url,
            method: self.method,
            headers: self.headers,
            body: self.body,
            timeout: self.timeout,
            transport,
            middleware,
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    /// Build and send.
    pub async fn send(self) -> Result<Response> {
        self.build().send().await
    }
}

/// One logical HTTP call.
pub struct Request {
    id: Uuid,
    url: String,
    method: String,
    headers: Headers,
    body: Body,
    timeout: u64,
    transport: Arc<dyn Transport>,
    middleware: Vec<Arc<dyn Middleware>>,
    lifecycle: Arc<Lifecycle>,
}

enum Outcome {
    Settled(Result<Response>),
    Aborted,
    TimedOut,
}

impl Request {
    /// Start building a `GET` request for `url`.
    pub fn builder(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(url)
    }

    /// Identifier recorded on log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current URL; rewritten on redirect.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Replace the URL
    pub fn set_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.url = url.into();
        self
    }

    /// Upper-case method
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Replace the method; normalized to upper case.
    pub fn set_method(&mut self, method: impl AsRef<str>) -> &mut Self {
        self.method = method.as_ref().to_ascii_uppercase();
        self
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

    /// Replace a header
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    /// Media type of the `Content-Type` header
    pub fn content_type(&self) -> Option<&str> {
        self.headers.content_type()
    }

    /// Request body
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Replace the body
    pub fn set_body(&mut self, body: impl Into<Body>) -> &mut Self {
        self.body = body.into();
        self
    }

    /// Move the body out, leaving [`Body::Empty`].
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// Timeout in milliseconds; `0` means disabled.
    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    /// The transport bound to this request
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Attach middleware before the request starts.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) -> Result<&mut Self> {
        if self.lifecycle.is_started() {
            return Err(self.error(
                ErrorCode::Started,
                "Middleware can not be added after the request has started",
            ));
        }
        self.middleware.push(middleware);
        Ok(self)
    }

    /// Register a progress listener.
    ///
    /// A listener that returns an error aborts the request with that error as
    /// the cause.
    pub fn on_progress<F>(&self, listener: F) -> &Self
    where
        F: Fn(&Progress) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.lifecycle.on_progress(Arc::new(listener));
        self
    }

    /// Register an abort listener, called once on the first effective abort.
    pub fn on_abort<F>(&self, listener: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.lifecycle.on_abort(Arc::new(listener));
        self
    }

    /// Register a redirect listener, called with each resolved hop URL.
    pub fn on_redirect<F>(&self, listener: F) -> &Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.lifecycle.on_redirect(Arc::new(listener));
        self
    }

    /// Abort the request. Idempotent; returns `true` for the first
    /// effective call.
    pub fn abort(&self) -> bool {
        self.lifecycle
            .abort_with(Some(self.error(ErrorCode::Abort, "Request aborted")))
    }

    /// A handle that can abort the request from another task.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            lifecycle: self.lifecycle.clone(),
        }
    }

    /// Progress handle for transports.
    pub fn progress_reporter(&self) -> ProgressReporter {
        ProgressReporter::new(self.lifecycle.clone())
    }

    pub(crate) fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Lifecycle phase
    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// Whether the request has started
    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    /// Whether the transport has been invoked
    pub fn is_opened(&self) -> bool {
        self.lifecycle.is_opened()
    }

    /// Whether the request was aborted
    pub fn is_aborted(&self) -> bool {
        self.lifecycle.is_aborted()
    }

    /// Whether the request timed out
    pub fn is_timed_out(&self) -> bool {
        self.lifecycle.is_timed_out()
    }

    /// Transfer counters, still readable after a rejection.
    pub fn progress(&self) -> Progress {
        self.lifecycle.progress()
    }

    /// `(uploaded + downloaded) / 2`, in `[0, 1]`
    pub fn completed(&self) -> f64 {
        self.progress().completed()
    }

    /// Build an error that carries a snapshot of this request.
    pub fn error(&self, code: ErrorCode, message: impl Into<String>) -> Error {
        Error::new(code, message).with_request(self.to_json())
    }

    /// The rejection for an aborted request: the recorded reason, or
    /// `EABORT`.
    pub fn abort_error(&self) -> Error {
        match self.lifecycle.reason() {
            Some(reason) => self.attach(reason),
            None => self.error(ErrorCode::Abort, "Request aborted"),
        }
    }

    fn attach(&self, err: Error) -> Error {
        if err.has_request() {
            err
        } else {
            err.with_request(self.to_json())
        }
    }

    /// JSON snapshot
    pub fn to_json(&self) -> RequestJson {
        RequestJson {
            url: self.url.clone(),
            method: self.method.clone(),
            headers: self.headers.to_map(),
            body: self.body.to_json_value(),
            timeout: self.timeout,
        }
    }

    /// Copy for a redirect hop: same lifecycle, fresh mutable fields.
    pub(crate) fn fork(&self) -> Request {
        Request {
            id: self.id,
            url: self.url.clone(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            timeout: self.timeout,
            transport: self.transport.clone(),
            middleware: self.middleware.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }

    /// Run the request to its single settlement.
    ///
    /// The middleware chain races the abort signal and, when `timeout > 0`,
    /// a timer armed once for the whole send. Whichever finishes first wins;
    /// a request that ends up aborted always rejects, even when a response
    /// was already produced.
    pub async fn send(&mut self) -> Result<Response> {
        if !self.lifecycle.start() {
            return Err(self.error(ErrorCode::Started, "Request has already been sent"));
        }

        tracing::debug!(
            id = %self.id,
            method = %self.method,
            url = %self.url,
            "request started"
        );

        let chain = Compose::new(self.middleware.clone(), Arc::new(Open));
        let lifecycle = self.lifecycle.clone();
        let timeout = self.timeout;

        let outcome = {
            let timer = async {
                if timeout > 0 {
                    tokio::time::sleep(Duration::from_millis(timeout)).await
                } else {
                    std::future::pending::<()>().await
                }
            };
            let dispatch = chain.call(self);
            tokio::pin!(timer);
            tokio::pin!(dispatch);
            let mut timer_armed = true;

            loop {
                tokio::select! {
                    biased;
                    _ = lifecycle.cancelled() => break Outcome::Aborted,
                    _ = &mut timer, if timer_armed => {
                        timer_armed = false;
                        let reason = Error::new(
                            ErrorCode::Timeout,
                            format!("Timeout of {}ms exceeded", timeout),
                        );
                        // A fully transferred request can no longer time out.
                        if lifecycle.time_out(reason) {
                            break Outcome::TimedOut;
                        }
                    }
                    result = &mut dispatch => break Outcome::Settled(result),
                }
            }
        };

        let mut result = match outcome {
            Outcome::Settled(result) => result,
            Outcome::TimedOut | Outcome::Aborted => {
                self.interrupt();
                Err(self.abort_error())
            }
        };

        if self.lifecycle.is_aborted() {
            result = Err(self.abort_error());
        }

        let result = match result {
            Ok(mut res) => {
                res.set_request(self.to_json());
                Ok(res)
            }
            Err(err) => Err(self.attach(err)),
        };

        self.lifecycle.settle(result.is_ok());
        match &result {
            Ok(res) => tracing::debug!(
                id = %self.id,
                status = res.status(),
                url = %res.url(),
                "request resolved"
            ),
            Err(err) => tracing::debug!(
                id = %self.id,
                code = %err.code(),
                error = %err,
                "request rejected"
            ),
        }
        result
    }

    fn interrupt(&self) {
        if self.lifecycle.is_opened() {
            let transport = self.transport.clone();
            transport.abort(self);
        }
    }

    /// Send on the runtime and hand the settlement to `callback`.
    pub fn exec<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.await) })
    }
}

impl IntoFuture for Request {
    type Output = Result<Response>;
    type IntoFuture = futures::future::BoxFuture<'static, Result<Response>>;

    fn into_future(mut self) -> Self::IntoFuture {
        Box::pin(async move { self.send().await })
    }
}

impl Clone for Request {
    /// A fresh, unstarted copy with its own lifecycle. Listeners are copied.
    fn clone(&self) -> Self {
        Request {
            id: Uuid::new_v4(),
            url: self.url.clone(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            timeout: self.timeout,
            transport: self.transport.clone(),
            middleware: self.middleware.clone(),
            lifecycle: Arc::new(Lifecycle::with_listeners(self.lifecycle.listeners())),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("middleware", &self.middleware.len())
            .field("phase", &self.lifecycle.phase())
            .finish()
    }
}

/// Aborts a request from anywhere, including while it is being sent.
#[derive(Clone)]
pub struct AbortHandle {
    lifecycle: Arc<Lifecycle>,
}

impl AbortHandle {
    /// Abort with `EABORT`; `false` if the request was already aborted or
    /// complete.
    pub fn abort(&self) -> bool {
        self.lifecycle.abort()
    }

    /// Whether the request was aborted
    pub fn is_aborted(&self) -> bool {
        self.lifecycle.is_aborted()
    }
}

impl fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortHandle")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
