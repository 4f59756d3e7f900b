//! Cookie jar middleware.

use crate::client::{Middleware, Next};
use crate::cookies::CookieJar;
use crate::error::{Error, ErrorCode, Result};
use crate::protocol::constants::headers;
use crate::types::{Request, Response};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

struct Cookies {
    jar: Arc<dyn CookieJar>,
}

#[async_trait]
impl Middleware for Cookies {
    async fn handle(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        let url = Url::parse(req.url()).map_err(|e| {
            req.error(ErrorCode::Invalid, format!("Invalid URL \"{}\"", req.url()))
                .with_cause(e)
        })?;

        let stored = self.jar.get_cookie_string(&url).await?;
        if !stored.is_empty() {
            let mut values: Vec<String> = req
                .headers()
                .get_all(headers::COOKIE)
                .into_iter()
                .map(String::from)
                .collect();
            values.push(stored);
            req.set(headers::COOKIE, values.join("; "));
        }

        let res = next.run(req).await?;

        for cookie in res.headers().get_all(headers::SET_COOKIE) {
            match self.jar.set_cookie(cookie, &url).await {
                Ok(()) => {}
                // Invalid cookies are dropped, like a browser would.
                Err(err) if err.code() == ErrorCode::Type => {
                    tracing::debug!(url = %url, cookie, error = %err, "ignoring cookie");
                }
                Err(err) => return Err(attach(req, err)),
            }
        }

        Ok(res)
    }
}

fn attach(req: &Request, err: Error) -> Error {
    if err.request().is_some() {
        err
    } else {
        err.with_request(req.to_json())
    }
}

/// Send cookies from `jar` and store every `Set-Cookie` received.
///
/// Existing `Cookie` values on the request are kept and the jar's cookies are
/// appended. Runs once per redirect hop when placed inside the redirect
/// engine, so each hop sends the cookies that match its own URL.
pub fn cookies(jar: Arc<dyn CookieJar>) -> Arc<dyn Middleware> {
    Arc::new(Cookies { jar })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Compose, Handler};
    use crate::cookies::MemoryCookieJar;

    /// Reflects the request `Cookie` header and sets a cookie.
    struct SetsCookie;

    #[async_trait]
    impl Handler for SetsCookie {
        async fn call(&self, req: &mut Request) -> Result<Response> {
            let mut res = Response::new(200)
                .with_header("Set-Cookie", "hello=world; Path=/")
                .with_header("Set-Cookie", "bad=1; Domain=elsewhere.org");
            if let Some(cookie) = req.get("Cookie") {
                res = res.with_body(cookie);
            }
            Ok(res)
        }
    }

    #[tokio::test]
    async fn test_cookies_round_trip_through_jar() {
        let jar = Arc::new(MemoryCookieJar::new());
        let chain = Compose::new(vec![cookies(jar.clone())], Arc::new(SetsCookie));

        let mut first = Request::builder("http://example.com/cookie").build();
        let res = chain.call(&mut first).await.unwrap();
        assert!(!first.headers().has("Cookie"));
        assert_eq!(res.text().as_deref(), Some(""));
        assert_eq!(jar.len(), 1);

        let mut second = Request::builder("http://example.com/echo")
            .header("Cookie", "manual=1")
            .build();
        let res = chain.call(&mut second).await.unwrap();
        assert_eq!(res.text().as_deref(), Some("manual=1; hello=world"));
    }
}
