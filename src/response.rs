//! Uniform read-only view over a transport response.
//!
//! [`RawResponse`] is what the transport hands back and what error handlers
//! and response handlers inspect. It keeps the status, reason phrase,
//! headers, body bytes and the URL that was actually requested.

use crate::error::{Error, Result, UnexpectedReason};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::borrow::Cow;

/// A raw HTTP response as produced by a [`Transport`](crate::Transport).
///
/// # Examples
///
/// ```
/// use pipeclient::RawResponse;
/// use http::HeaderMap;
///
/// let response = RawResponse::new(404, HeaderMap::new(), "gone", "https://api.example.com/x");
/// assert_eq!(response.status(), 404);
/// assert_eq!(response.status_reason(), "Not Found");
/// assert_eq!(response.text(), "gone");
/// ```
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: u16,
    reason: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    url: String,
}

impl RawResponse {
    /// Creates a new `RawResponse`.
    pub fn new(
        status: u16,
        headers: HeaderMap,
        body: impl Into<Bytes>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            status,
            reason: None,
            headers,
            body: body.into(),
            url: url.into(),
        }
    }

    /// Overrides the reason phrase reported by the server.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The textual reason for the status, e.g. `"Not Found"`.
    ///
    /// Uses the phrase supplied by the transport when there is one, otherwise
    /// the canonical phrase for the code, otherwise an empty string.
    pub fn status_reason(&self) -> &str {
        if let Some(reason) = self.reason.as_deref() {
            return reason;
        }
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The raw body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// The URL the request was sent to, after any redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unexpected`] with [`UnexpectedReason::Decoding`] if
    /// the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Error::caused_by(
                UnexpectedReason::Decoding,
                format!("Unable to decode response data to json. data='{}'", self.text()),
                e,
            )
            .with_status(self.status)
        })
    }
}
