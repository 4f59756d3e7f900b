//! Client configuration.

use crate::error::{Error, ErrorCode, Result};
use crate::protocol::constants::{DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};

/// Options for [`Client`](crate::Client) and
/// [`HttpTransport`](crate::HttpTransport).
///
/// Missing fields take their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Default per-request timeout in milliseconds; `0` disables it.
    pub request_timeout_ms: u64,

    /// Follow 3xx responses.
    pub follow_redirects: bool,

    /// Hop budget before `EMAXREDIRECTS`.
    pub max_redirects: usize,

    /// Negotiate and transparently decode gzip, deflate and brotli.
    pub unzip: bool,

    /// Default `User-Agent`.
    pub user_agent: String,

    /// Proxy for every request; empty for none.
    pub proxy_url: String,

    /// Idle connection lifetime in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Idle connections kept per host.
    pub pool_max_idle_per_host: usize,

    /// Reject invalid TLS certificates.
    pub reject_unauthorized: bool,

    /// Log every exchange at `debug` and degraded setup at `warn`.
    pub enable_logging: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 0,
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            unzip: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy_url: String::new(),
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
            reject_unauthorized: true,
            enable_logging: true,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON document; unknown fields are ignored.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::new(ErrorCode::Type, format!("Invalid client configuration: {}", e))
                .with_cause(e)
        })
    }
}
