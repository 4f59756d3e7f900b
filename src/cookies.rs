//! Cookie jar contract and an in-memory implementation.
//!
//! The jar is the one resource shared across requests and across the hops of
//! a redirect chain. The `cookies` middleware asks it for the `Cookie` string
//! of every attempted URL and hands it every `Set-Cookie` value received, so
//! implementations must tolerate concurrent calls.

use crate::error::{Error, ErrorCode, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use url::Url;

/// Storage consulted by the `cookies` middleware.
#[async_trait]
pub trait CookieJar: Send + Sync {
    /// `Cookie` header value for `url`; empty when nothing matches.
    async fn get_cookie_string(&self, url: &Url) -> Result<String>;

    /// Persist one `Set-Cookie` value received from `url`.
    async fn set_cookie(&self, cookie: &str, url: &Url) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CookieEntry {
    name: String,
    value: String,
    domain: String,
    host_only: bool,
    path: String,
    secure: bool,
}

impl CookieEntry {
    fn matches(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default();
        let domain_match = if self.host_only {
            host.eq_ignore_ascii_case(&self.domain)
        } else {
            host.eq_ignore_ascii_case(&self.domain)
                || host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", self.domain))
        };

        domain_match && path_match(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }

    fn same_slot(&self, other: &CookieEntry) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

fn path_match(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

fn default_path(url: &Url) -> String {
    match url.path().rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_string(),
        _ => "/".to_string(),
    }
}

/// In-memory jar. Expiry attributes other than `Max-Age=0` are ignored, as is
/// `HttpOnly`, which only restricts script access.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    entries: RwLock<Vec<CookieEntry>>,
}

impl MemoryCookieJar {
    /// Create an empty jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored cookies
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// `true` when no cookies are stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every cookie
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn parse(header: &str, url: &Url) -> Result<(CookieEntry, bool)> {
        let mut parts = header.split(';');
        let pair = parts.next().unwrap_or_default();
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            Error::new(ErrorCode::Type, format!("Invalid cookie \"{}\"", header))
        })?;

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let mut cookie = CookieEntry {
            name: name.trim().to_string(),
            value: value.trim().to_string(),
            domain: host.clone(),
            host_only: true,
            path: default_path(url),
            secure: false,
        };
        let mut expired = false;

        for attribute in parts {
            let attribute = attribute.trim();
            let (key, value) = attribute.split_once('=').unwrap_or((attribute, ""));
            match key.trim().to_ascii_lowercase().as_str() {
                "path" if value.starts_with('/') => cookie.path = value.to_string(),
                "domain" if !value.is_empty() => {
                    let domain = value.trim_start_matches('.').to_ascii_lowercase();
                    if host != domain && !host.ends_with(&format!(".{}", domain)) {
                        return Err(Error::new(
                            ErrorCode::Type,
                            format!("Cookie domain \"{}\" does not match \"{}\"", domain, host),
                        ));
                    }
                    cookie.domain = domain;
                    cookie.host_only = false;
                }
                "max-age" => expired = value.trim().parse::<i64>().is_ok_and(|age| age <= 0),
                "secure" => cookie.secure = true,
                _ => {}
            }
        }

        Ok((cookie, expired))
    }
}

#[async_trait]
impl CookieJar for MemoryCookieJar {
    async fn get_cookie_string(&self, url: &Url) -> Result<String> {
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .filter(|cookie| cookie.matches(url))
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; "))
    }

    async fn set_cookie(&self, cookie: &str, url: &Url) -> Result<()> {
        let (cookie, expired) = Self::parse(cookie, url)?;
        let mut entries = self.entries.write();
        entries.retain(|existing| !existing.same_slot(&cookie));
        if !expired {
            entries.push(cookie);
        }
        Ok(())
    }
}
