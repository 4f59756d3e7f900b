//! Body encoding and decoding.

use crate::client::{Middleware, Next};
use crate::error::{ErrorCode, Result};
use crate::protocol::constants::media;
use crate::protocol::{is_form_data, is_json, is_url_encoded};
use crate::types::{encode_form, Body, Request, Response};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};

static JSON_PROTECTION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\)\]\}',?\n").expect("static regex"));

struct Stringify;

#[async_trait]
impl Middleware for Stringify {
    async fn handle(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        if req.body().is_structured() {
            if req.content_type().is_none() {
                let default = match req.body() {
                    Body::Form(_) => media::URL_ENCODED,
                    _ => media::JSON,
                };
                req.headers_mut().set_content_type(default);
            }

            let media_type = req.content_type().unwrap_or_default().to_string();
            if let Some(encoded) = encode(req, &media_type)? {
                req.set_body(encoded);
            }
        }

        next.run(req).await
    }
}

/// Encode a structured body for `media_type`. `None` leaves the body as is.
fn encode(req: &Request, media_type: &str) -> Result<Option<Body>> {
    let body = req.body();

    if is_json(media_type) {
        let text = match body {
            Body::Json(value) => serde_json::to_string(value),
            Body::Form(pairs) => serde_json::to_string(
                &pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect::<serde_json::Map<_, _>>(),
            ),
            _ => return Ok(None),
        }
        .map_err(|e| {
            req.error(ErrorCode::Stringify, format!("Unable to stringify request body: {}", e))
                .with_cause(e)
        })?;
        return Ok(Some(Body::Text(text)));
    }

    if is_url_encoded(media_type) {
        let pairs = match body {
            Body::Form(pairs) => pairs.clone(),
            Body::Json(Value::Object(map)) => {
                let mut pairs = Vec::with_capacity(map.len());
                for (key, value) in map {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        Value::Bool(_) | Value::Number(_) => value.to_string(),
                        Value::Array(_) | Value::Object(_) => {
                            return Err(req.error(
                                ErrorCode::Stringify,
                                format!("Unable to stringify nested value for \"{}\"", key),
                            ));
                        }
                    };
                    pairs.push((key.clone(), value));
                }
                pairs
            }
            Body::Json(_) => {
                return Err(req.error(
                    ErrorCode::Stringify,
                    "Unable to stringify a non-object body as form data",
                ));
            }
            _ => return Ok(None),
        };
        return Ok(Some(Body::Text(encode_form(&pairs))));
    }

    if is_form_data(media_type) {
        return Err(req.error(
            ErrorCode::Stringify,
            "Unable to stringify request body as multipart/form-data",
        ));
    }

    Ok(None)
}

/// Encode [`Body::Json`] and [`Body::Form`] according to `Content-Type`.
///
/// Without a content type, JSON values default to `application/json` and
/// form pairs to `application/x-www-form-urlencoded`. Encoding failures
/// reject with `ESTRINGIFY`; unknown media types are left for the `headers`
/// middleware to refuse.
pub fn stringify() -> Arc<dyn Middleware> {
    Arc::new(Stringify)
}

/// Response formats understood by [`parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseType {
    /// `application/json` and `application/*+json` into [`Body::Json`]
    Json,
    /// `application/x-www-form-urlencoded` into [`Body::Form`]
    UrlEncoded,
}

impl ParseType {
    fn accepts(&self, media_type: &str) -> bool {
        match self {
            ParseType::Json => is_json(media_type),
            ParseType::UrlEncoded => is_url_encoded(media_type),
        }
    }
}

struct Parse {
    types: Vec<ParseType>,
    strict: bool,
}

#[async_trait]
impl Middleware for Parse {
    async fn handle(&self, req: &mut Request, next: Next<'_>) -> Result<Response> {
        let mut res = next.run(req).await?;

        if matches!(res.body(), Body::Empty | Body::Json(_) | Body::Form(_)) {
            return Ok(res);
        }
        if matches!(res.body(), Body::Stream(_)) {
            return Err(req.error(ErrorCode::Parse, "Unable to parse a streaming response body"));
        }

        let bytes = res.body().to_bytes().unwrap_or_default();

        if bytes.is_empty() {
            res.set_body(Body::Empty);
            return Ok(res);
        }

        let media_type = match res.content_type() {
            Some(media_type) if !media_type.is_empty() => media_type.to_string(),
            _ => {
                return Err(req.error(
                    ErrorCode::Parse,
                    "Unable to parse empty response content type",
                ));
            }
        };

        match self.types.iter().find(|ty| ty.accepts(&media_type)) {
            Some(ParseType::Json) => {
                let text = String::from_utf8_lossy(&bytes);
                let text = JSON_PROTECTION_PREFIX.replace(&text, "");
                let value: Value = serde_json::from_str(&text).map_err(|e| {
                    req.error(ErrorCode::Parse, format!("Unable to parse response body: {}", e))
                        .with_cause(e)
                })?;
                res.set_body(Body::Json(value));
            }
            Some(ParseType::UrlEncoded) => {
                let pairs = url::form_urlencoded::parse(&bytes).into_owned().collect();
                res.set_body(Body::Form(pairs));
            }
            None if self.strict => {
                return Err(req.error(
                    ErrorCode::Parse,
                    format!("Unhandled response type: {}", media_type),
                ));
            }
            None => {}
        }

        Ok(res)
    }
}

/// Decode response bodies whose media type matches one of `types`.
///
/// Empty bodies become [`Body::Empty`]. A body without a content type fails
/// with `EPARSE`, as does an unmatched type when `strict` is set. The
/// `)]}',` JSON protection prefix is stripped before decoding.
pub fn parse(types: &[ParseType], strict: bool) -> Arc<dyn Middleware> {
    Arc::new(Parse {
        types: types.to_vec(),
        strict,
    })
}
