//! The high-level client.
//!
//! # Examples
//!
//! ## Simple GET request
//!
//! ```ignore
//! use relay_http::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new();
//!     let response = client.get("http://example.com/api/data").send().await?;
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Posting JSON with a deadline
//!
//! ```ignore
//! use relay_http::Client;
//! use std::time::Duration;
//!
//! let client = Client::new();
//! let response = client
//!     .post("http://example.com/users")
//!     .json(serde_json::json!({ "name": "relay" }))
//!     .timeout(Duration::from_secs(2))
//!     .send()
//!     .await?;
//! ```
//!
//! ## Cookies across requests
//!
//! ```ignore
//! use relay_http::{Client, ClientConfig, HttpTransport, MemoryCookieJar};
//! use std::sync::Arc;
//!
//! let transport = HttpTransport::builder()
//!     .jar(Arc::new(MemoryCookieJar::new()))
//!     .build();
//! let client = Client::with_transport(Arc::new(transport), ClientConfig::default());
//! ```

use crate::client::config::ClientConfig;
use crate::transport::{HttpTransport, Transport};
use crate::types::{Request, RequestBuilder};
use std::sync::Arc;

/// Factory for requests that share a transport and defaults.
///
/// Cloning is cheap; clones share the transport and its connection pool.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl Client {
    /// Client with the default configuration
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Client with an [`HttpTransport`] built from `config`.
    pub fn with_config(config: ClientConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config.clone()));
        Self::with_transport(transport, config)
    }

    /// Client over a custom transport. `config` supplies request defaults.
    pub fn with_transport(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Client {
            transport,
            config: Arc::new(config),
        }
    }

    /// Start a `GET` request with the client defaults applied.
    pub fn request(&self, url: impl Into<String>) -> RequestBuilder {
        Request::builder(url)
            .timeout_ms(self.config.request_timeout_ms)
            .transport(self.transport.clone())
    }

    /// `GET`
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(url)
    }

    /// `POST`
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(url).method("POST")
    }

    /// `PUT`
    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(url).method("PUT")
    }

    /// `PATCH`
    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(url).method("PATCH")
    }

    /// `DELETE`
    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(url).method("DELETE")
    }

    /// `HEAD`
    pub fn head(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(url).method("HEAD")
    }

    /// The shared transport
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Client::new();
        assert_eq!(client.config().max_redirects, 5);
    }

    #[test]
    fn test_method_helpers() {
        let client = Client::with_config(ClientConfig {
            request_timeout_ms: 750,
            ..Default::default()
        });

        let req = client.patch("http://example.com").build();
        assert_eq!(req.method(), "PATCH");
        assert_eq!(req.timeout(), 750);

        assert_eq!(client.head("http://example.com").build().method(), "HEAD");
        assert_eq!(client.delete("http://example.com").build().method(), "DELETE");
    }
}
