//! Protocol constants.

/// Header names used by the client and its default middleware.
pub mod headers {
    /// `Accept`
    pub const ACCEPT: &str = "Accept";
    /// `Accept-Encoding`
    pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
    /// `Content-Encoding`
    pub const CONTENT_ENCODING: &str = "Content-Encoding";
    /// `Content-Length`
    pub const CONTENT_LENGTH: &str = "Content-Length";
    /// `Content-Type`
    pub const CONTENT_TYPE: &str = "Content-Type";
    /// `Cookie`
    pub const COOKIE: &str = "Cookie";
    /// `Host`
    pub const HOST: &str = "Host";
    /// `Location`
    pub const LOCATION: &str = "Location";
    /// `Set-Cookie`
    pub const SET_COOKIE: &str = "Set-Cookie";
    /// `Transfer-Encoding`
    pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
    /// `User-Agent`
    pub const USER_AGENT: &str = "User-Agent";
}

/// Media types recognised by the body middleware.
pub mod media {
    /// Default type for structured bodies
    pub const JSON: &str = "application/json";
    /// Form pairs
    pub const URL_ENCODED: &str = "application/x-www-form-urlencoded";
}

/// Default number of redirects followed before `EMAXREDIRECTS`.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Default `User-Agent` sent by the socket transport.
pub const DEFAULT_USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION")
);

/// `Accept-Encoding` advertised when transparent decoding is enabled.
pub const DEFAULT_ACCEPT_ENCODING: &str = "gzip, deflate, br";
