//! Transport boundary.
//!
//! A [`Transport`] performs the actual network call for a request. Every
//! request chain ends in the [`Open`] handler, which refuses URLs known to
//! hang some client environments (`EINVALID`), marks the request opened and
//! hands it to the bound transport.
//!
//! The crate ships [`HttpTransport`], built on `reqwest`. Other environments
//! plug in by implementing the trait.

mod http;

pub use self::http::{HttpTransport, HttpTransportBuilder};

use crate::client::{Handler, Middleware};
use crate::error::{ErrorCode, Result};
use crate::protocol::is_hanging_url;
use crate::types::{Request, Response};
use async_trait::async_trait;
use std::sync::Arc;

/// Executes requests on a network stack.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the call.
    ///
    /// Implementations report transfer progress through
    /// [`Request::progress_reporter`].
    async fn open(&self, req: &mut Request) -> Result<Response>;

    /// Best-effort cancellation of an `open` in flight. Called at most once,
    /// after the request was aborted or timed out while opened.
    fn abort(&self, _req: &Request) {}

    /// Request middleware used when the caller supplies none.
    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        Vec::new()
    }
}

/// Terminal handler of every request chain.
pub(crate) struct Open;

#[async_trait]
impl Handler for Open {
    async fn call(&self, req: &mut Request) -> Result<Response> {
        if is_hanging_url(req.url()) {
            return Err(req.error(
                ErrorCode::Invalid,
                format!("Refused to connect to invalid URL \"{}\"", req.url()),
            ));
        }

        req.lifecycle().mark_opened();
        let transport = req.transport().clone();
        transport.open(req).await
    }
}
