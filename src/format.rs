//! Request body formatters.

use crate::error::{Error, Result, UnexpectedReason};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue};

/// An encoded request body together with the headers describing it.
#[derive(Debug, Clone, Default)]
pub struct Formatted {
    /// The encoded body.
    pub body: Bytes,
    /// Content headers to set on the request.
    pub headers: HeaderMap,
}

/// Encodes an outgoing payload.
///
/// The client converts the caller's `Serialize` value into a
/// [`serde_json::Value`] before calling the formatter, so implementations
/// can target any wire format reachable from a JSON data model.
pub trait RequestFormatter: Send + Sync {
    /// Encodes `body`.
    fn format(&self, body: &serde_json::Value) -> Result<Formatted>;
}

/// Encodes bodies as UTF-8 JSON with `Content-Type: application/json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl RequestFormatter for JsonFormatter {
    fn format(&self, body: &serde_json::Value) -> Result<Formatted> {
        let encoded = serde_json::to_vec(body).map_err(|e| {
            Error::caused_by(UnexpectedReason::Formatting, "Failed to serialize request", e)
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Ok(Formatted {
            body: Bytes::from(encoded),
            headers,
        })
    }
}
