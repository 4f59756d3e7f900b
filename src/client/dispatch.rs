//! Middleware composition.
//!
//! A chain is an ordered list of [`Middleware`] ending in a terminal
//! [`Handler`]. [`Compose`] turns the pair into a single handler:
//!
//! ```text
//!   A pre -> B pre -> C pre -> terminal -> C post -> B post -> A post
//! ```
//!
//! Each middleware receives the request and a [`Next`] continuation. It may
//! mutate the request, call `next.run(req)` once to continue, inspect or
//! rewrite the returned response, translate errors, or skip `next` entirely
//! and answer on its own.
//!
//! # Rules enforced at runtime
//!
//! - `next` may be run at most once per middleware invocation; a second call
//!   fails with `ENEXT` ("next called multiple times").
//! - Once the request is aborted every further `next` rejects with the abort
//!   reason without reaching the terminal handler.
//!
//! Every call to [`Compose::call`] starts a fresh dispatch, so a handler that
//! wraps a composed chain (such as the redirect engine) can drive it once per
//! attempt.
//!
//! # Example
//!
//! ```ignore
//! use relay_http::{Middleware, Next, Request, Response, Result};
//!
//! struct Trace;
//!
//! #[async_trait::async_trait]
//! impl Middleware for Trace {
//!     async fn handle(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
//!         tracing::info!(url = req.url(), "out");
//!         let res = next.run(req).await?;
//!         tracing::info!(status = res.status(), "in");
//!         Ok(res)
//!     }
//! }
//! ```

use crate::error::{ErrorCode, Result};
use crate::types::{Request, Response};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A step in the request pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process `req`, usually by delegating to `next` and post-processing.
    async fn handle(&self, req: &mut Request, next: Next<'_>) -> Result<Response>;
}

/// Anything that turns a request into a response.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Execute the request
    async fn call(&self, req: &mut Request) -> Result<Response>;
}

/// Continuation handed to each middleware.
pub struct Next<'a> {
    dispatch: &'a Dispatch<'a>,
    pos: usize,
}

impl<'a> Next<'a> {
    /// Continue with the following middleware, or the terminal handler.
    pub fn run<'b>(&'b self, req: &'b mut Request) -> BoxFuture<'b, Result<Response>> {
        self.dispatch.dispatch(self.pos + 1, req)
    }
}

struct Dispatch<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    terminal: &'a dyn Handler,
    // One past the highest position dispatched so far.
    reached: AtomicUsize,
}

impl<'a> Dispatch<'a> {
    fn dispatch<'b>(&'b self, pos: usize, req: &'b mut Request) -> BoxFuture<'b, Result<Response>> {
        Box::pin(async move {
            if pos < self.reached.load(Ordering::SeqCst) {
                return Err(req.error(ErrorCode::NextCalledTwice, "next() called multiple times"));
            }

            if req.is_aborted() {
                return Err(req.abort_error());
            }

            self.reached.store(pos + 1, Ordering::SeqCst);

            match self.middleware.get(pos) {
                Some(middleware) => {
                    let next = Next {
                        dispatch: self,
                        pos,
                    };
                    middleware.handle(req, next).await
                }
                None => self.terminal.call(req).await,
            }
        })
    }
}

/// An ordered middleware list bound to a terminal handler.
#[derive(Clone)]
pub struct Compose {
    middleware: Vec<Arc<dyn Middleware>>,
    terminal: Arc<dyn Handler>,
}

impl Compose {
    /// Bind `middleware` to `terminal`
    pub fn new(middleware: Vec<Arc<dyn Middleware>>, terminal: Arc<dyn Handler>) -> Self {
        Compose {
            middleware,
            terminal,
        }
    }

    /// Number of middleware in the chain
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// `true` when requests go straight to the terminal handler
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

#[async_trait]
impl Handler for Compose {
    async fn call(&self, req: &mut Request) -> Result<Response> {
        let dispatch = Dispatch {
            middleware: &self.middleware,
            terminal: self.terminal.as_ref(),
            reached: AtomicUsize::new(0),
        };
        dispatch.dispatch(0, req).await
    }
}
