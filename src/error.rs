//! Error types for the relay HTTP client.
//!
//! Every failure surfaced to a caller is an [`Error`] carrying a stable,
//! machine-readable [`ErrorCode`], a human-readable message, an optional
//! underlying cause and a snapshot of the request that produced it.
//!
//! # Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | `EABORT` | Request cancelled by the caller or by a timeout |
//! | `ETIMEOUT` | Timeout elapsed; the request was also aborted |
//! | `EINVALID` | URL refused before any network attempt |
//! | `EUNAVAILABLE` | Transport-level connectivity failure |
//! | `EMAXREDIRECTS` | Redirect hop budget exceeded |
//! | `EPARSE` | Response body could not be decoded |
//! | `ESTRINGIFY` | Request body could not be encoded |
//! | `ECSP` / `ETYPE` / `EBODY` | Environment or configuration failures |
//! | `ENEXT` | A middleware called `next` more than once |
//! | `ESTARTED` | Request mutated or re-sent after it started |

use crate::types::RequestJson;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Boxed error accepted as a cause, e.g. from progress listeners or cookie jars.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Result type for all fallible client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stable machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// `EABORT`
    Abort,
    /// `ETIMEOUT`
    Timeout,
    /// `EINVALID`
    Invalid,
    /// `EUNAVAILABLE`
    Unavailable,
    /// `EMAXREDIRECTS`
    MaxRedirects,
    /// `EPARSE`
    Parse,
    /// `ESTRINGIFY`
    Stringify,
    /// `ECSP`
    Csp,
    /// `ETYPE`
    Type,
    /// `EBODY`
    Body,
    /// `ENEXT`
    NextCalledTwice,
    /// `ESTARTED`
    Started,
}

impl ErrorCode {
    /// The wire code, e.g. `"EABORT"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Abort => "EABORT",
            ErrorCode::Timeout => "ETIMEOUT",
            ErrorCode::Invalid => "EINVALID",
            ErrorCode::Unavailable => "EUNAVAILABLE",
            ErrorCode::MaxRedirects => "EMAXREDIRECTS",
            ErrorCode::Parse => "EPARSE",
            ErrorCode::Stringify => "ESTRINGIFY",
            ErrorCode::Csp => "ECSP",
            ErrorCode::Type => "ETYPE",
            ErrorCode::Body => "EBODY",
            ErrorCode::NextCalledTwice => "ENEXT",
            ErrorCode::Started => "ESTARTED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client error.
///
/// Cheap to clone: the cause and request snapshot are reference counted, so
/// the lifecycle controller can keep the first rejection reason and hand out
/// copies to every observer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    code: ErrorCode,
    message: String,
    request: Option<Arc<RequestJson>>,
    #[source]
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Error {
    /// Create an error without a request snapshot.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Error {
            code,
            message: message.into(),
            request: None,
            cause: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        self.cause = Some(Arc::from(cause.into()));
        self
    }

    /// Attach a snapshot of the originating request.
    pub fn with_request(mut self, request: RequestJson) -> Self {
        self.request = Some(Arc::new(request));
        self
    }

    pub(crate) fn has_request(&self) -> bool {
        self.request.is_some()
    }

    /// Stable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Snapshot of the request that produced this error, when known.
    pub fn request(&self) -> Option<&RequestJson> {
        self.request.as_deref()
    }

    /// Whether re-issuing a clone of the request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.code, ErrorCode::Unavailable | ErrorCode::Timeout)
    }

    /// `true` for `EABORT` and `ETIMEOUT`.
    pub fn is_abort(&self) -> bool {
        matches!(self.code, ErrorCode::Abort | ErrorCode::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorCode::Abort.as_str(), "EABORT");
        assert_eq!(ErrorCode::MaxRedirects.to_string(), "EMAXREDIRECTS");
        assert_eq!(ErrorCode::NextCalledTwice.as_str(), "ENEXT");
    }

    #[test]
    fn test_cause_is_exposed_as_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::new(ErrorCode::Unavailable, "Unable to connect").with_cause(io);

        assert_eq!(err.to_string(), "Unable to connect");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("refused"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_errors_are_not_retryable() {
        let err = Error::new(ErrorCode::Parse, "bad json");
        assert!(!err.is_retryable());
        assert!(!err.is_abort());
        assert!(err.request().is_none());
    }
}
