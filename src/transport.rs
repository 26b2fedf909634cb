//! The network boundary of the pipeline.
//!
//! The [`Transport`] trait is the only place where I/O happens. The default
//! implementation, [`ReqwestTransport`], owns a `reqwest::Client` and its
//! connection pool; tests and callers can substitute their own.

use crate::error::{Error, Result, UnexpectedReason};
use crate::request::Request;
use crate::response::RawResponse;
use async_trait::async_trait;
use std::time::Instant;
use url::Url;

/// Sends a fully prepared [`Request`] and returns the raw response.
///
/// Implementations must report failures that happen before a response exists
/// (refused connections, timeouts) as [`Error::Unexpected`] with the
/// matching [`UnexpectedReason`], so retry predicates can tell them apart.
/// Non-2xx responses are *not* errors at this layer.
///
/// # Examples
///
/// ```
/// use pipeclient::{RawResponse, Request, Result, Transport};
/// use async_trait::async_trait;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Transport for Echo {
///     async fn send(&self, request: Request) -> Result<RawResponse> {
///         let body = request.body.unwrap_or_default();
///         Ok(RawResponse::new(200, request.headers, body, request.url))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request.
    async fn send(&self, request: Request) -> Result<RawResponse>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder().build().map_err(|e| {
            Error::caused_by(
                UnexpectedReason::Configuration,
                "Failed to build HTTP client",
                e,
            )
        })?;
        Ok(Self { http_client })
    }

    /// Wraps an existing `reqwest::Client`.
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<RawResponse> {
        let mut url = Url::parse(&request.url).map_err(|e| {
            Error::caused_by(
                UnexpectedReason::Configuration,
                format!("Invalid URL '{}'", request.url),
                e,
            )
        })?;

        if !request.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in request.params.pairs() {
                pairs.append_pair(key, value);
            }
        }

        tracing::debug!(
            method = %request.method,
            url = %url,
            timeout_ms = request.timeout.as_millis(),
            "Executing HTTP request"
        );

        let mut builder = self
            .http_client
            .request(request.method.clone(), url)
            .headers(request.headers)
            .timeout(request.timeout);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let start_time = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&request.url, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&request.url, e))?;

        tracing::info!(
            status = status.as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "Received HTTP response"
        );

        let mut raw = RawResponse::new(status.as_u16(), headers, body, final_url);
        if let Some(reason) = status.canonical_reason() {
            raw = raw.with_reason(reason);
        }
        Ok(raw)
    }
}

fn transport_error(endpoint: &str, error: reqwest::Error) -> Error {
    let reason = if error.is_timeout() {
        UnexpectedReason::Timeout
    } else if error.is_connect() {
        UnexpectedReason::Connect
    } else {
        UnexpectedReason::Transport
    };
    Error::caused_by(reason, format!("Error when contacting '{}'", endpoint), error)
}
