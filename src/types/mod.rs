//! Request, response and body types.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Request`] | One logical HTTP call, built with [`RequestBuilder`] |
//! | [`Response`] | Status, headers and body returned by the pipeline |
//! | [`Body`] | Tagged body union shared by both |
//! | [`AbortHandle`] | Cancels a request from another task |
//! | [`RequestJson`] / [`ResponseJson`] | Serializable snapshots |

mod body;
mod request;
mod response;

pub(crate) use body::encode_form;
pub use body::{Body, ByteStream, StreamBody};
pub use request::{AbortHandle, Request, RequestBuilder, RequestJson};
pub use response::{Response, ResponseJson};
