//! Request and response bodies.
//!
//! A [`Body`] is decided when it is constructed; nothing downstream has to
//! sniff its shape. Structured variants ([`Body::Json`], [`Body::Form`]) are
//! turned into text by the `stringify` middleware on the way out and produced
//! by the `parse` middleware on the way in.

use crate::error::BoxError;
use base64::Engine as _;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed byte stream used for streaming uploads.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send + Sync>>;

/// A streaming body handle.
///
/// Clones share the same underlying stream, which can be taken once.
#[derive(Clone)]
pub struct StreamBody {
    inner: Arc<Mutex<Option<ByteStream>>>,
}

impl StreamBody {
    /// Wrap a stream of byte chunks.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + Sync + 'static,
    {
        StreamBody {
            inner: Arc::new(Mutex::new(Some(Box::pin(stream)))),
        }
    }

    /// Take the stream; `None` when it has already been consumed.
    pub fn take(&self) -> Option<ByteStream> {
        self.inner.lock().take()
    }

    /// Whether the stream is still available
    pub fn is_available(&self) -> bool {
        self.inner.lock().is_some()
    }
}

impl fmt::Debug for StreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBody")
            .field("available", &self.is_available())
            .finish()
    }
}

/// Body of a request or response.
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No body
    #[default]
    Empty,
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Bytes(Bytes),
    /// Structured value, encoded according to `Content-Type`
    Json(serde_json::Value),
    /// Ordered form pairs
    Form(Vec<(String, String)>),
    /// Streaming upload
    Stream(StreamBody),
}

impl Body {
    /// Build a streaming body.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + Sync + 'static,
    {
        Body::Stream(StreamBody::new(stream))
    }

    /// `true` for [`Body::Empty`] and zero-length text or bytes.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Text(text) => text.is_empty(),
            Body::Bytes(bytes) => bytes.is_empty(),
            _ => false,
        }
    }

    /// Byte length when known without encoding or consuming anything.
    pub fn len(&self) -> Option<u64> {
        match self {
            Body::Empty => Some(0),
            Body::Text(text) => Some(text.len() as u64),
            Body::Bytes(bytes) => Some(bytes.len() as u64),
            _ => None,
        }
    }

    /// Whether the body still needs the `stringify` middleware.
    pub fn is_structured(&self) -> bool {
        matches!(self, Body::Json(_) | Body::Form(_))
    }

    /// Encode a buffered body. Streams return `None`.
    ///
    /// Structured bodies fall back to JSON and URL-encoding respectively.
    pub fn to_bytes(&self) -> Option<Bytes> {
        match self {
            Body::Empty => Some(Bytes::new()),
            Body::Text(text) => Some(Bytes::copy_from_slice(text.as_bytes())),
            Body::Bytes(bytes) => Some(bytes.clone()),
            Body::Json(value) => serde_json::to_vec(value).ok().map(Bytes::from),
            Body::Form(pairs) => Some(Bytes::from(encode_form(pairs))),
            Body::Stream(_) => None,
        }
    }

    /// Buffer the whole body, draining a stream if necessary.
    pub async fn into_bytes(self) -> Result<Bytes, BoxError> {
        match self {
            Body::Stream(stream) => {
                let mut stream = stream.take().ok_or("body stream already consumed")?;
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                Ok(buffer.freeze())
            }
            other => Ok(other.to_bytes().unwrap_or_default()),
        }
    }

    /// Text view of buffered content (lossy for non UTF-8 bytes).
    pub fn as_text(&self) -> Option<String> {
        match self {
            Body::Text(text) => Some(text.clone()),
            Body::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Body::Empty => Some(String::new()),
            Body::Json(value) => Some(value.to_string()),
            Body::Form(pairs) => Some(encode_form(pairs)),
            Body::Stream(_) => None,
        }
    }

    /// Render for JSON snapshots; bytes become base64 text.
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Body::Empty | Body::Stream(_) => Value::Null,
            Body::Text(text) => Value::String(text.clone()),
            Body::Bytes(bytes) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Body::Json(value) => value.clone(),
            Body::Form(pairs) => Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        }
    }
}

/// `application/x-www-form-urlencoded` serialization.
pub(crate) fn encode_form(pairs: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}
