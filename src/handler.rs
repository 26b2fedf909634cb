//! Response handlers decode successful responses into result values.
//!
//! A handler only ever sees responses that passed classification. Decode
//! failures surface as [`Error::Unexpected`] with
//! [`UnexpectedReason::Decoding`] and the parser error chained as source.

use crate::error::{Error, Result, UnexpectedReason};
use crate::response::RawResponse;
use serde::de::DeserializeOwned;

/// Decodes a successful response into a `T`.
///
/// One handler type can serve many output types: [`JsonHandler`] implements
/// `ResponseHandler<T>` for every deserializable `T`, so the client's
/// operations pick the output type at the call site.
pub trait ResponseHandler<T>: Send + Sync {
    /// Decodes `response`.
    fn decode(&self, response: RawResponse) -> Result<T>;
}

/// Returns the [`RawResponse`] unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawHandler;

impl ResponseHandler<RawResponse> for RawHandler {
    fn decode(&self, response: RawResponse) -> Result<RawResponse> {
        Ok(response)
    }
}

/// Decodes JSON bodies with `serde_json`.
///
/// An empty body decodes as JSON `null`, so `()`, `Option<_>` and
/// `serde_json::Value` all accept `204 No Content`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHandler;

impl<T: DeserializeOwned> ResponseHandler<T> for JsonHandler {
    fn decode(&self, response: RawResponse) -> Result<T> {
        if response.body().is_empty() {
            return serde_json::from_value(serde_json::Value::Null).map_err(|e| {
                tracing::error!(error = %e, "Empty response body for non-optional type");
                Error::caused_by(
                    UnexpectedReason::Decoding,
                    "Unable to decode response data to json. data=''",
                    e,
                )
                .with_status(response.status())
            });
        }

        response.json().map_err(|e| {
            tracing::error!(
                error = %e,
                raw_response = %response.text(),
                "Failed to deserialize response"
            );
            e
        })
    }
}

/// Parses XML bodies into an [`xmltree::Element`] tree.
///
/// An empty body yields `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlHandler;

impl ResponseHandler<Option<xmltree::Element>> for XmlHandler {
    fn decode(&self, response: RawResponse) -> Result<Option<xmltree::Element>> {
        if response.body().is_empty() {
            return Ok(None);
        }

        xmltree::Element::parse(response.body().as_ref())
            .map(Some)
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to parse XML response");
                Error::caused_by(
                    UnexpectedReason::Decoding,
                    format!("Unable to parse response data to xml. data='{}'", response.text()),
                    e,
                )
                .with_status(response.status())
            })
    }
}

/// Decodes YAML bodies with `serde_yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlHandler;

impl<T: DeserializeOwned> ResponseHandler<T> for YamlHandler {
    fn decode(&self, response: RawResponse) -> Result<T> {
        serde_yaml::from_slice(response.body()).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse YAML response");
            Error::caused_by(
                UnexpectedReason::Decoding,
                format!("Unable to decode response data to yaml. data='{}'", response.text()),
                e,
            )
            .with_status(response.status())
        })
    }
}
