//! Status-driven error classification.

use crate::error::Error;
use crate::response::RawResponse;

/// Turns a response into a typed error, or lets it through.
///
/// Implement this to pull structured failure details out of a body before
/// raising. Returning `None` for a non-2xx response does not let it through:
/// the pipeline then falls back to [`DefaultErrorHandler`].
///
/// # Examples
///
/// ```
/// use pipeclient::{Error, ErrorHandler, RawResponse};
///
/// struct ApiErrors;
///
/// impl ErrorHandler for ApiErrors {
///     fn classify(&self, response: &RawResponse) -> Option<Error> {
///         if response.is_success() {
///             return None;
///         }
///         let detail = response
///             .json::<serde_json::Value>()
///             .ok()
///             .and_then(|v| v["detail"].as_str().map(str::to_string))
///             .unwrap_or_default();
///         Some(Error::from_status(response.status(), detail, response.text()))
///     }
/// }
/// ```
pub trait ErrorHandler: Send + Sync {
    /// Returns the error for `response`, or `None` if it is a success.
    fn classify(&self, response: &RawResponse) -> Option<Error>;
}

/// Maps statuses onto the [`Error`] bands.
///
/// 2xx passes regardless of body content. 3xx, 4xx and 5xx produce the
/// matching band error with the leaf for the exact code. Anything else is
/// [`Error::Unexpected`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn classify(&self, response: &RawResponse) -> Option<Error> {
        let status = response.status();
        if response.is_success() {
            return None;
        }

        let message = format!(
            "{} Error: {} for url: {}",
            status,
            response.status_reason(),
            response.url()
        );
        let error = Error::from_status(status, message, response.text());

        match &error {
            Error::Client { .. } => tracing::error!(
                status = status,
                response = %response.text(),
                "Client error (4xx)"
            ),
            Error::Server { .. } => tracing::warn!(
                status = status,
                response = %response.text(),
                "Server error (5xx)"
            ),
            _ => tracing::warn!(status = status, "Unsuccessful response"),
        }

        Some(error)
    }
}

/// Runs `handler` and enforces that every non-2xx response yields an error.
pub(crate) fn check_response(handler: &dyn ErrorHandler, response: &RawResponse) -> Result<(), Error> {
    match handler.classify(response) {
        Some(error) => Err(error),
        None if response.is_success() => Ok(()),
        None => match DefaultErrorHandler.classify(response) {
            Some(error) => Err(error),
            None => Ok(()),
        },
    }
}
