//! `reqwest` transport.
//!
//! [`HttpTransport::open`] runs its own pipeline, built once from the
//! [`ClientConfig`]:
//!
//! ```text
//! user_agent -> content_encoding? -> Redirects? -> cookies? -> Exchange
//! ```
//!
//! The cookie middleware sits inside the redirect engine so every hop reads
//! and stores cookies for its own URL. The underlying client never follows
//! redirects itself.

use super::Transport;
use crate::client::{ClientConfig, Compose, Handler, Middleware};
use crate::cookies::CookieJar;
use crate::error::{ErrorCode, Result};
use crate::middleware::{
    content_encoding, cookies, headers, stringify, user_agent, ConfirmRedirect, Redirects,
};
use crate::protocol::Headers;
use crate::types::{Body, Request, Response};
use async_trait::async_trait;
use bytes::BytesMut;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;

/// Sends one attempt over `reqwest` and buffers the response body.
struct Exchange {
    client: reqwest::Client,
    enable_logging: bool,
}

#[async_trait]
impl Handler for Exchange {
    async fn call(&self, req: &mut Request) -> Result<Response> {
        let url = url::Url::parse(req.url()).map_err(|e| {
            req.error(ErrorCode::Invalid, format!("Invalid URL \"{}\"", req.url()))
                .with_cause(e)
        })?;
        let method = reqwest::Method::from_bytes(req.method().as_bytes()).map_err(|e| {
            req.error(ErrorCode::Type, format!("Invalid method \"{}\"", req.method()))
                .with_cause(e)
        })?;

        let reporter = req.progress_reporter();
        let mut builder = self.client.request(method, url);
        for (name, value) in req.headers().iter() {
            builder = builder.header(name, value);
        }

        builder = match req.body() {
            Body::Stream(stream) => {
                let stream = stream.take().ok_or_else(|| {
                    req.error(ErrorCode::Body, "Request body stream was already consumed")
                })?;
                let upload = reporter.clone();
                let mut sent = 0u64;
                builder.body(reqwest::Body::wrap_stream(stream.inspect_ok(
                    move |chunk| {
                        sent += chunk.len() as u64;
                        upload.uploaded(sent);
                    },
                )))
            }
            Body::Empty => {
                reporter.upload_length(Some(0));
                builder
            }
            body => {
                let bytes = body.to_bytes().unwrap_or_default();
                reporter.upload_length(Some(bytes.len() as u64));
                builder.body(bytes)
            }
        };

        if self.enable_logging {
            tracing::debug!(id = %req.id(), method = %req.method(), url = %req.url(), "sending");
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                req.error(ErrorCode::Type, format!("Unable to build request for \"{}\"", req.url()))
                    .with_cause(e)
            } else {
                req.error(ErrorCode::Unavailable, format!("Unable to connect to \"{}\"", req.url()))
                    .with_cause(e)
            }
        })?;

        let uploaded = reporter.clone();
        if let Some(length) = req.body().len() {
            uploaded.uploaded(length);
        }
        uploaded.finish_upload();

        let status = response.status().as_u16();
        let reason = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned());
        let headers = Headers::from(response.headers());
        reporter.download_length(response.content_length());

        if self.enable_logging {
            tracing::debug!(id = %req.id(), status, url = %req.url(), "response headers received");
        }

        let mut stream = response.bytes_stream();
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                req.error(ErrorCode::Unavailable, format!("Unable to read response from \"{}\"", req.url()))
                    .with_cause(e)
            })?;
            buffer.extend_from_slice(&chunk);
            reporter.downloaded(buffer.len() as u64);
        }
        reporter.finish_download();

        let mut res = Response::new(status);
        if let Some(reason) = reason {
            res = res.with_status_text(reason);
        }
        Ok(res
            .with_headers(headers)
            .with_body(buffer.freeze())
            .with_url(req.url()))
    }
}

/// Builder for [`HttpTransport`].
pub struct HttpTransportBuilder {
    config: ClientConfig,
    jar: Option<Arc<dyn CookieJar>>,
    confirm: Option<ConfirmRedirect>,
}

impl HttpTransportBuilder {
    /// Replace the configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Cookie jar consulted on every hop.
    pub fn jar(mut self, jar: Arc<dyn CookieJar>) -> Self {
        self.jar = Some(jar);
        self
    }

    /// Confirmation for `307`/`308` redirects of non-`GET`/`HEAD` requests.
    pub fn confirm_redirect<F>(mut self, confirm: F) -> Self
    where
        F: Fn(&Request, &Response) -> bool + Send + Sync + 'static,
    {
        self.confirm = Some(Arc::new(confirm));
        self
    }

    /// Build the transport and its pipeline.
    pub fn build(self) -> HttpTransport {
        let config = self.config;
        let client = build_client(&config);

        let exchange: Arc<dyn Handler> = Arc::new(Exchange {
            client,
            enable_logging: config.enable_logging,
        });

        let per_hop: Vec<Arc<dyn Middleware>> = self.jar.into_iter().map(cookies).collect();
        let attempt: Arc<dyn Handler> = Arc::new(Compose::new(per_hop, exchange));

        let terminal: Arc<dyn Handler> = if config.follow_redirects {
            let mut redirects = Redirects::new(attempt).max_redirects(config.max_redirects);
            if let Some(confirm) = self.confirm {
                redirects = redirects.confirm_redirect(confirm);
            }
            Arc::new(redirects)
        } else {
            attempt
        };

        let mut middleware = vec![user_agent(config.user_agent.clone())];
        if config.unzip {
            middleware.push(content_encoding());
        }

        HttpTransport {
            pipeline: Compose::new(middleware, terminal),
            config: Arc::new(config),
        }
    }
}

fn build_client(config: &ClientConfig) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .gzip(config.unzip)
        .deflate(config.unzip)
        .brotli(config.unzip)
        .danger_accept_invalid_certs(!config.reject_unauthorized)
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host);

    if !config.proxy_url.is_empty() {
        match reqwest::Proxy::all(&config.proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) if config.enable_logging => {
                tracing::warn!(proxy = %config.proxy_url, error = %e, "ignoring invalid proxy");
            }
            Err(_) => {}
        }
    }

    builder.build().unwrap_or_else(|e| {
        if config.enable_logging {
            tracing::warn!(error = %e, "falling back to a default HTTP client");
        }
        reqwest::Client::default()
    })
}

/// Socket-based transport.
#[derive(Clone)]
pub struct HttpTransport {
    pipeline: Compose,
    config: Arc<ClientConfig>,
}

impl HttpTransport {
    /// Transport for `config`, without a cookie jar.
    pub fn new(config: ClientConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Start from the default configuration.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder {
            config: ClientConfig::default(),
            jar: None,
            confirm: None,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, req: &mut Request) -> Result<Response> {
        self.pipeline.call(req).await
    }

    /// Dropping the in-flight exchange already closed the connection.
    fn abort(&self, req: &Request) {
        if self.config.enable_logging {
            tracing::debug!(id = %req.id(), url = %req.url(), "connection aborted");
        }
    }

    /// `stringify`, then `headers`.
    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        vec![stringify(), headers()]
    }
}
