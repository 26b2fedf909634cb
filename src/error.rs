//! Error taxonomy for pipeline calls.
//!
//! Every failure surfaces as a single [`Error`] value. The variants mirror the
//! status bands: [`Error::Redirection`] (3xx), [`Error::Client`] (4xx),
//! [`Error::Server`] (5xx), and [`Error::Unexpected`] for everything that has
//! no meaningful status (transport failures, out-of-range codes, encode and
//! decode failures). Within a band, [`ErrorKind`] names the specific status
//! code, falling back to the band's generic member for unmapped codes.

use std::fmt;

/// Boxed cause carried by [`Error::Unexpected`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The status band an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    /// 3xx responses.
    Redirection,
    /// 4xx responses.
    Client,
    /// 5xx responses.
    Server,
    /// Anything without a usable status.
    Unexpected,
}

impl Band {
    /// Returns the band containing `status`, or [`Band::Unexpected`] when the
    /// status lies outside [300, 600).
    pub fn of(status: u16) -> Band {
        match status {
            300..=399 => Band::Redirection,
            400..=499 => Band::Client,
            500..=599 => Band::Server,
            _ => Band::Unexpected,
        }
    }
}

macro_rules! error_kinds {
    (
        $(
            $band:ident {
                generic: $generic:ident,
                $( $variant:ident = $code:literal, )*
            }
        )*
    ) => {
        /// The leaf kind of an error.
        ///
        /// Each specific variant corresponds to exactly one HTTP status code.
        /// `Redirection`, `ClientError` and `ServerError` are the band
        /// fallbacks for codes without a dedicated leaf.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ErrorKind {
            $(
                #[allow(missing_docs)]
                $generic,
                $(
                    #[allow(missing_docs)]
                    $variant,
                )*
            )*
            /// Transport, encode, decode or out-of-range status failure.
            Unexpected,
        }

        impl ErrorKind {
            /// Looks up the leaf kind for a status code.
            ///
            /// Codes in [300, 600) without a dedicated leaf map to the band's
            /// generic member; everything else maps to
            /// [`ErrorKind::Unexpected`].
            pub fn from_status(status: u16) -> ErrorKind {
                match status {
                    $( $( $code => ErrorKind::$variant, )* )*
                    _ => match Band::of(status) {
                        Band::Redirection => ErrorKind::Redirection,
                        Band::Client => ErrorKind::ClientError,
                        Band::Server => ErrorKind::ServerError,
                        Band::Unexpected => ErrorKind::Unexpected,
                    },
                }
            }

            /// The status code this leaf stands for, if it is a specific one.
            pub fn status_code(self) -> Option<u16> {
                match self {
                    $( $( ErrorKind::$variant => Some($code), )* )*
                    _ => None,
                }
            }

            /// The band this kind belongs to.
            pub fn band(self) -> Band {
                match self {
                    $(
                        ErrorKind::$generic $( | ErrorKind::$variant )* => Band::$band,
                    )*
                    ErrorKind::Unexpected => Band::Unexpected,
                }
            }
        }
    };
}

error_kinds! {
    Redirection {
        generic: Redirection,
        MultipleChoices = 300,
        MovedPermanently = 301,
        Found = 302,
        SeeOther = 303,
        NotModified = 304,
        UseProxy = 305,
        TemporaryRedirect = 307,
        PermanentRedirect = 308,
    }
    Client {
        generic: ClientError,
        BadRequest = 400,
        Unauthorized = 401,
        PaymentRequired = 402,
        Forbidden = 403,
        NotFound = 404,
        MethodNotAllowed = 405,
        NotAcceptable = 406,
        ProxyAuthenticationRequired = 407,
        RequestTimeout = 408,
        Conflict = 409,
        Gone = 410,
        LengthRequired = 411,
        PreconditionFailed = 412,
        RequestEntityTooLarge = 413,
        RequestUriTooLong = 414,
        UnsupportedMediaType = 415,
        RequestedRangeNotSatisfiable = 416,
        ExpectationFailed = 417,
        UnprocessableEntity = 422,
        Locked = 423,
        FailedDependency = 424,
        UpgradeRequired = 426,
        PreconditionRequired = 428,
        TooManyRequests = 429,
        RequestHeaderFieldsTooLarge = 431,
    }
    Server {
        generic: ServerError,
        InternalServerError = 500,
        NotImplemented = 501,
        BadGateway = 502,
        ServiceUnavailable = 503,
        GatewayTimeout = 504,
        HttpVersionNotSupported = 505,
        VariantAlsoNegotiates = 506,
        InsufficientStorage = 507,
        LoopDetected = 508,
        NotExtended = 510,
        NetworkAuthenticationRequired = 511,
    }
}

/// Why an [`Error::Unexpected`] was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnexpectedReason {
    /// The connection could not be established.
    Connect,
    /// The request timed out before a response arrived.
    Timeout,
    /// Any other transport-level failure.
    Transport,
    /// The server answered with a status outside the 2xx-5xx bands.
    InvalidStatus,
    /// The request body could not be encoded.
    Formatting,
    /// A successful response body could not be decoded.
    Decoding,
    /// The client or request was misconfigured (bad URL, header, ...).
    Configuration,
}

impl UnexpectedReason {
    /// `true` when the failure happened before any response existed.
    pub fn is_connection_failure(self) -> bool {
        matches!(self, UnexpectedReason::Connect | UnexpectedReason::Timeout)
    }
}

impl fmt::Display for UnexpectedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnexpectedReason::Connect => "connect",
            UnexpectedReason::Timeout => "timeout",
            UnexpectedReason::Transport => "transport",
            UnexpectedReason::InvalidStatus => "invalid status",
            UnexpectedReason::Formatting => "formatting",
            UnexpectedReason::Decoding => "decoding",
            UnexpectedReason::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// The error type for pipeline calls.
///
/// Callers can match broadly on the band variant or narrowly on
/// [`Error::kind`]:
///
/// ```
/// use pipeclient::{Error, ErrorKind};
///
/// let err = Error::from_status(404, "404 Error: Not Found for url: http://x/", "missing");
/// assert!(matches!(err, Error::Client { .. }));
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// assert!(!err.is_retryable());
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A 3xx status was the final answer to the request.
    #[error("{message}")]
    Redirection {
        /// The leaf kind
        kind: ErrorKind,
        /// The HTTP status code
        status: u16,
        /// Human-readable description
        message: String,
        /// The raw response body
        info: String,
    },

    /// A 4xx status was returned, usually because of invalid caller input.
    #[error("{message}")]
    Client {
        /// The leaf kind
        kind: ErrorKind,
        /// The HTTP status code
        status: u16,
        /// Human-readable description
        message: String,
        /// The raw response body
        info: String,
    },

    /// A 5xx status was returned.
    #[error("{message}")]
    Server {
        /// The leaf kind
        kind: ErrorKind,
        /// The HTTP status code
        status: u16,
        /// Human-readable description
        message: String,
        /// The raw response body
        info: String,
    },

    /// Transport failure, out-of-range status, or an encode/decode failure.
    #[error("{message}")]
    Unexpected {
        /// What went wrong
        reason: UnexpectedReason,
        /// The status code, when a response was received
        status: Option<u16>,
        /// Human-readable description
        message: String,
        /// The underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// Raised by a pagination advance function to end iteration.
    ///
    /// The paginator consumes this signal; it is never yielded to callers.
    #[error("no more pages")]
    NoMorePages,
}

impl Error {
    /// Builds the typed error for a response status.
    ///
    /// Statuses in [300, 600) produce the matching band variant; anything
    /// else produces [`Error::Unexpected`] with
    /// [`UnexpectedReason::InvalidStatus`].
    pub fn from_status(status: u16, message: impl Into<String>, info: impl Into<String>) -> Error {
        let kind = ErrorKind::from_status(status);
        let message = message.into();
        let info = info.into();
        match kind.band() {
            Band::Redirection => Error::Redirection {
                kind,
                status,
                message,
                info,
            },
            Band::Client => Error::Client {
                kind,
                status,
                message,
                info,
            },
            Band::Server => Error::Server {
                kind,
                status,
                message,
                info,
            },
            Band::Unexpected => Error::Unexpected {
                reason: UnexpectedReason::InvalidStatus,
                status: Some(status),
                message,
                source: None,
            },
        }
    }

    /// Builds an [`Error::Unexpected`] without a cause.
    pub fn unexpected(reason: UnexpectedReason, message: impl Into<String>) -> Error {
        Error::Unexpected {
            reason,
            status: None,
            message: message.into(),
            source: None,
        }
    }

    /// Builds an [`Error::Unexpected`] chaining `cause` as its source.
    pub fn caused_by(
        reason: UnexpectedReason,
        message: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Error {
        Error::Unexpected {
            reason,
            status: None,
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    /// Shorthand for a [`UnexpectedReason::Configuration`] error.
    pub fn configuration(message: impl Into<String>) -> Error {
        Error::unexpected(UnexpectedReason::Configuration, message)
    }

    /// Attaches the response status to an [`Error::Unexpected`].
    pub(crate) fn with_status(mut self, code: u16) -> Error {
        if let Error::Unexpected { status, .. } = &mut self {
            *status = Some(code);
        }
        self
    }

    /// The band this error belongs to.
    pub fn band(&self) -> Band {
        match self {
            Error::Redirection { .. } => Band::Redirection,
            Error::Client { .. } => Band::Client,
            Error::Server { .. } => Band::Server,
            Error::Unexpected { .. } | Error::NoMorePages => Band::Unexpected,
        }
    }

    /// The leaf kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Redirection { kind, .. }
            | Error::Client { kind, .. }
            | Error::Server { kind, .. } => *kind,
            Error::Unexpected { .. } | Error::NoMorePages => ErrorKind::Unexpected,
        }
    }

    /// The HTTP status code, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Redirection { status, .. }
            | Error::Client { status, .. }
            | Error::Server { status, .. } => Some(*status),
            Error::Unexpected { status, .. } => *status,
            Error::NoMorePages => None,
        }
    }

    /// The raw response body attached to a band error.
    pub fn info(&self) -> Option<&str> {
        match self {
            Error::Redirection { info, .. }
            | Error::Client { info, .. }
            | Error::Server { info, .. } => Some(info),
            _ => None,
        }
    }

    /// The reason of an [`Error::Unexpected`].
    pub fn unexpected_reason(&self) -> Option<UnexpectedReason> {
        match self {
            Error::Unexpected { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Returns `true` if this error is transient.
    ///
    /// Server errors and failures to reach the server at all are transient.
    /// Redirection and client errors signal a caller mistake and are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Server { .. } => true,
            Error::Unexpected { reason, .. } => reason.is_connection_failure(),
            Error::Redirection { .. } | Error::Client { .. } | Error::NoMorePages => false,
        }
    }
}

/// A specialized `Result` type for pipeline calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_cover_status_ranges() {
        for status in 300..600u16 {
            let err = Error::from_status(status, "msg", "");
            let expected = match status {
                300..=399 => Band::Redirection,
                400..=499 => Band::Client,
                _ => Band::Server,
            };
            assert_eq!(err.band(), expected, "status {}", status);
            assert_eq!(err.status(), Some(status));
            assert_eq!(err.kind().band(), expected);
        }
    }

    #[test]
    fn test_specific_leaves() {
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::TooManyRequests);
        assert_eq!(ErrorKind::from_status(301), ErrorKind::MovedPermanently);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::ServiceUnavailable);
        assert_eq!(ErrorKind::NotFound.status_code(), Some(404));
        assert_eq!(ErrorKind::ClientError.status_code(), None);
    }

    #[test]
    fn test_unmapped_codes_fall_back_to_band_generic() {
        assert_eq!(ErrorKind::from_status(306), ErrorKind::Redirection);
        assert_eq!(ErrorKind::from_status(418), ErrorKind::ClientError);
        assert_eq!(ErrorKind::from_status(599), ErrorKind::ServerError);
    }

    #[test]
    fn test_out_of_range_is_unexpected() {
        for status in [0u16, 99, 600, 999] {
            let err = Error::from_status(status, "msg", "");
            assert_eq!(err.band(), Band::Unexpected);
            assert_eq!(err.unexpected_reason(), Some(UnexpectedReason::InvalidStatus));
            assert_eq!(err.status(), Some(status));
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::from_status(500, "", "").is_retryable());
        assert!(Error::from_status(503, "", "").is_retryable());
        assert!(!Error::from_status(404, "", "").is_retryable());
        assert!(!Error::from_status(429, "", "").is_retryable());
        assert!(!Error::from_status(302, "", "").is_retryable());
        assert!(Error::unexpected(UnexpectedReason::Connect, "refused").is_retryable());
        assert!(Error::unexpected(UnexpectedReason::Timeout, "slow").is_retryable());
        assert!(!Error::unexpected(UnexpectedReason::Decoding, "bad").is_retryable());
    }

    #[test]
    fn test_cause_is_chained() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::caused_by(UnexpectedReason::Connect, "Error when contacting 'x'", io);
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "refused");
        assert_eq!(err.to_string(), "Error when contacting 'x'");
    }
}
