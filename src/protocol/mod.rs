//! Protocol-level helpers shared by requests, responses and middleware.
//!
//! - [`Headers`] - the header container
//! - [`RedirectPolicy`] / [`redirect_policy`] - the status-code table used by
//!   the redirect engine
//! - URL recognisers and resolution
//! - MIME recognisers for the body middleware
//!
//! # Redirect table
//!
//! | Status | Policy |
//! |--------|--------|
//! | 301, 302, 303 | [`RedirectPolicy::FollowWithGet`] |
//! | 307, 308 | [`RedirectPolicy::FollowWithConfirmation`] |
//! | anything else | not a redirect |
//!
//! # Examples
//!
//! ```
//! use relay_http::protocol::{redirect_policy, RedirectPolicy, resolve_url};
//!
//! assert_eq!(redirect_policy(303), Some(RedirectPolicy::FollowWithGet));
//! assert_eq!(redirect_policy(304), None);
//!
//! let next = resolve_url("http://host/redirect", "/destination").unwrap();
//! assert_eq!(next, "http://host/destination");
//! ```

pub mod constants;
mod headers;

pub use headers::{media_type, Headers};

use crate::error::{Error, ErrorCode, Result};
use regex::Regex;
use std::sync::LazyLock;

static HANGING_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?:/*(?:[~#\\?;:]|$)").expect("static regex"));

static JSON_MIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^application/(?:[\w!#$%&*`\-.^~]*\+)?json$").expect("static regex")
});

static URL_ENCODED_MIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^application/x-www-form-urlencoded$").expect("static regex")
});

static FORM_DATA_MIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^multipart/form-data$").expect("static regex"));

/// How a redirect-eligible response is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// Re-issue as `GET` (or `HEAD`) without a body.
    FollowWithGet,
    /// Follow automatically for `GET`/`HEAD`, otherwise only when confirmed.
    FollowWithConfirmation,
}

/// Classify a status code.
pub fn redirect_policy(status: u16) -> Option<RedirectPolicy> {
    match status {
        301 | 302 | 303 => Some(RedirectPolicy::FollowWithGet),
        307 | 308 => Some(RedirectPolicy::FollowWithConfirmation),
        _ => None,
    }
}

/// URLs that hang some client environments forever: a scheme followed
/// directly by a fragment, query, colon or nothing at all.
pub fn is_hanging_url(url: &str) -> bool {
    HANGING_URL.is_match(url)
}

/// Resolve `location` against `base`.
pub fn resolve_url(base: &str, location: &str) -> Result<String> {
    let base = url::Url::parse(base).map_err(|e| {
        Error::new(ErrorCode::Invalid, format!("Invalid URL \"{}\"", base)).with_cause(e)
    })?;

    base.join(location)
        .map(String::from)
        .map_err(|e| {
            Error::new(
                ErrorCode::Invalid,
                format!("Invalid redirect location \"{}\"", location),
            )
            .with_cause(e)
        })
}

/// `application/json` and `application/*+json`
pub fn is_json(media_type: &str) -> bool {
    JSON_MIME.is_match(media_type)
}

/// `application/x-www-form-urlencoded`
pub fn is_url_encoded(media_type: &str) -> bool {
    URL_ENCODED_MIME.is_match(media_type)
}

/// `multipart/form-data`
pub fn is_form_data(media_type: &str) -> bool {
    FORM_DATA_MIME.is_match(media_type)
}
