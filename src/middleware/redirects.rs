//! Redirect policy engine.
//!
//! [`Redirects`] is a [`Handler`] that wraps the per-attempt pipeline
//! (typically `cookies` and the network exchange) and drives it once per hop:
//!
//! 1. Run the inner handler.
//! 2. Classify the status with [`redirect_policy`]; anything that is not a
//!    redirect, or has no `Location`, is returned as is.
//! 3. Resolve `Location` against the current URL.
//! 4. Build the next attempt from a fork of the request as it entered the
//!    engine, so per-hop mutations such as cookies never compound.
//! 5. Emit the redirect event, count the hop, and fail with `EMAXREDIRECTS`
//!    once the count exceeds the limit.
//!
//! `301`, `302` and `303` re-issue the request as `GET` (`HEAD` stays `HEAD`)
//! without a body. Once downgraded, later hops stay downgraded. `307` and
//! `308` keep the method and body; for anything but `GET`/`HEAD` they are
//! only followed when the confirmation callback agrees, otherwise the 3xx
//! response is the result.

use crate::client::Handler;
use crate::error::{ErrorCode, Result};
use crate::protocol::constants::{headers, DEFAULT_MAX_REDIRECTS};
use crate::protocol::{redirect_policy, resolve_url, RedirectPolicy};
use crate::types::{Body, Request, Response};
use async_trait::async_trait;
use std::sync::Arc;

/// Decides whether a `307`/`308` for a non-`GET`/`HEAD` request is followed.
pub type ConfirmRedirect = Arc<dyn Fn(&Request, &Response) -> bool + Send + Sync>;

/// Handler that follows redirects returned by `inner`.
pub struct Redirects {
    inner: Arc<dyn Handler>,
    max_redirects: usize,
    confirm: Option<ConfirmRedirect>,
}

impl Redirects {
    /// Follow up to the default of 5 redirects.
    pub fn new(inner: Arc<dyn Handler>) -> Self {
        Redirects {
            inner,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            confirm: None,
        }
    }

    /// Hop budget
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Confirmation for method-preserving redirects of unsafe methods.
    pub fn confirm_redirect(mut self, confirm: ConfirmRedirect) -> Self {
        self.confirm = Some(confirm);
        self
    }

    fn confirmed(&self, req: &Request, res: &Response) -> bool {
        matches!(req.method(), "GET" | "HEAD")
            || self.confirm.as_ref().is_some_and(|confirm| confirm(req, res))
    }
}

fn downgrade(req: &mut Request, method: &str) {
    req.set_method(method);
    req.set_body(Body::Empty);
    req.headers_mut().remove(headers::TRANSFER_ENCODING);
    req.set(headers::CONTENT_LENGTH, "0");
}

#[async_trait]
impl Handler for Redirects {
    async fn call(&self, req: &mut Request) -> Result<Response> {
        let original = req.fork();
        let mut downgraded: Option<&'static str> = None;
        let mut hops = 0;

        loop {
            let res = self.inner.call(req).await?;

            let Some(policy) = redirect_policy(res.status()) else {
                return Ok(res);
            };
            let Some(location) = res.headers().get_first(headers::LOCATION) else {
                return Ok(res);
            };

            let next_url =
                resolve_url(req.url(), location).map_err(|e| e.with_request(req.to_json()))?;

            match policy {
                RedirectPolicy::FollowWithGet => {
                    downgraded = Some(if original.method() == "HEAD" { "HEAD" } else { "GET" });
                }
                RedirectPolicy::FollowWithConfirmation => {
                    if !self.confirmed(req, &res) {
                        return Ok(res);
                    }
                }
            }

            let mut next = original.fork();
            if let Some(method) = downgraded {
                downgrade(&mut next, method);
            }
            next.set_url(next_url.as_str());

            // The response body is not needed any further.
            drop(res);

            hops += 1;
            if hops > self.max_redirects {
                return Err(req.error(
                    ErrorCode::MaxRedirects,
                    format!("Maximum redirects exceeded: {}", self.max_redirects),
                ));
            }

            tracing::debug!(
                id = %req.id(),
                from = %req.url(),
                to = %next_url,
                method = %next.method(),
                "following redirect"
            );
            req.lifecycle().emit_redirect(&next_url);

            // Counters track the attempt in flight.
            req.lifecycle().reset_progress();
            *req = next;
        }
    }
}
