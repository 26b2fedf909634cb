//! Authentication strategies.
//!
//! An [`Authentication`] strategy decorates every outgoing request with
//! credentials. Most strategies are pure header or query-parameter edits;
//! [`CookieAuth`] additionally logs in once when the client is built.

use crate::classify::{check_response, ErrorHandler};
use crate::error::Result;
use crate::request::Request;
use crate::transport::Transport;
use async_trait::async_trait;
use base64::Engine;
use http::{header, Method};
use std::time::Duration;

/// Adds credentials to outgoing requests.
#[async_trait]
pub trait Authentication: Send + Sync {
    /// One-time setup run by [`ClientBuilder::build`](crate::ClientBuilder::build).
    ///
    /// The default does nothing. An error here aborts client construction.
    async fn initialize(
        &mut self,
        _transport: &dyn Transport,
        _error_handler: &dyn ErrorHandler,
        _timeout: Duration,
    ) -> Result<()> {
        Ok(())
    }

    /// Adds credentials to `request`. Must not perform I/O.
    fn apply(&self, request: &mut Request) -> Result<()>;
}

/// No authentication required.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl Authentication for NoAuth {
    fn apply(&self, _request: &mut Request) -> Result<()> {
        Ok(())
    }
}

/// Token passed as a query parameter, e.g. `?apikey=secret`.
///
/// An existing parameter with the same name is overwritten.
#[derive(Debug, Clone)]
pub struct QueryParameterAuth {
    parameter: String,
    token: String,
}

impl QueryParameterAuth {
    /// Creates a new `QueryParameterAuth`.
    pub fn new(parameter: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            token: token.into(),
        }
    }
}

impl Authentication for QueryParameterAuth {
    fn apply(&self, request: &mut Request) -> Result<()> {
        request
            .params
            .insert(self.parameter.clone(), self.token.clone());
        Ok(())
    }
}

/// Token passed in a header, by default `Authorization: Bearer <token>`.
///
/// # Examples
///
/// ```
/// use pipeclient::auth::{Authentication, HeaderAuth};
/// use pipeclient::Request;
/// use http::Method;
/// use std::time::Duration;
///
/// let auth = HeaderAuth::new("secret").scheme(Some("Token"));
/// let mut request = Request::new(Method::GET, "https://api.example.com", Duration::from_secs(1));
/// auth.apply(&mut request).unwrap();
/// assert_eq!(request.header("authorization"), Some("Token secret"));
/// ```
#[derive(Debug, Clone)]
pub struct HeaderAuth {
    token: String,
    parameter: String,
    scheme: Option<String>,
    extra: Vec<(String, String)>,
}

impl HeaderAuth {
    /// Creates a bearer-token header strategy.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            parameter: header::AUTHORIZATION.as_str().to_string(),
            scheme: Some("Bearer".to_string()),
            extra: Vec::new(),
        }
    }

    /// Sets the header name (default `Authorization`).
    pub fn parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = parameter.into();
        self
    }

    /// Sets the scheme prefix; `None` or an empty string sends the bare token.
    pub fn scheme(mut self, scheme: Option<impl Into<String>>) -> Self {
        self.scheme = scheme.map(Into::into);
        self
    }

    /// Adds an extra header sent alongside the token.
    pub fn extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    fn value(&self) -> String {
        match self.scheme.as_deref() {
            Some(scheme) if !scheme.is_empty() => format!("{} {}", scheme, self.token),
            _ => self.token.clone(),
        }
    }
}

impl Authentication for HeaderAuth {
    fn apply(&self, request: &mut Request) -> Result<()> {
        request.set_header(&self.parameter, self.value())?;
        for (name, value) in &self.extra {
            request.set_header(name, value)?;
        }
        Ok(())
    }
}

/// HTTP basic authentication.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    /// Creates a new `BasicAuth`.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Authentication for BasicAuth {
    fn apply(&self, request: &mut Request) -> Result<()> {
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password));
        request.set_header(header::AUTHORIZATION, format!("Basic {}", credentials))
    }
}

/// Session-cookie authentication.
///
/// On [`initialize`](Authentication::initialize) a GET is sent to `auth_url`
/// with the inner strategy applied. Every cookie the server sets is kept by
/// this instance and attached to all later requests. The cookies are written
/// only during `initialize`; afterwards they are read-only.
pub struct CookieAuth {
    auth_url: String,
    inner: Box<dyn Authentication>,
    cookies: Vec<(String, String)>,
}

impl CookieAuth {
    /// Creates a cookie strategy that logs in at `auth_url` using `inner`.
    pub fn new(auth_url: impl Into<String>, inner: impl Authentication + 'static) -> Self {
        Self {
            auth_url: auth_url.into(),
            inner: Box::new(inner),
            cookies: Vec::new(),
        }
    }

    /// The cookies captured during login.
    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[async_trait]
impl Authentication for CookieAuth {
    async fn initialize(
        &mut self,
        transport: &dyn Transport,
        error_handler: &dyn ErrorHandler,
        timeout: Duration,
    ) -> Result<()> {
        let mut request = Request::new(Method::GET, self.auth_url.clone(), timeout);
        self.inner.apply(&mut request)?;

        tracing::info!(url = %self.auth_url, "Performing cookie authentication");
        let response = transport.send(request).await?;
        check_response(error_handler, &response)?;

        self.cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();

        tracing::debug!(cookies = self.cookies.len(), "Stored authentication cookies");
        Ok(())
    }

    fn apply(&self, request: &mut Request) -> Result<()> {
        if self.cookies.is_empty() {
            return Ok(());
        }
        request.set_header(header::COOKIE, self.cookie_header())
    }
}

/// Extracts `name=value` from a `Set-Cookie` header, dropping attributes.
fn parse_set_cookie(value: &str) -> Option<(String, String)> {
    let pair = value.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::DefaultErrorHandler;
    use crate::request::{ParamValue, QueryParams};
    use crate::response::RawResponse;
    use http::{HeaderMap, HeaderValue};
    use std::sync::Mutex;

    fn request() -> Request {
        Request::new(Method::GET, "https://api.example.com", Duration::from_secs(1))
    }

    #[test]
    fn test_header_auth_with_scheme() {
        let mut req = request();
        HeaderAuth::new("t").apply(&mut req).unwrap();
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("Authorization"), Some("Bearer t"));
    }

    #[test]
    fn test_header_auth_without_scheme() {
        let mut req = request();
        HeaderAuth::new("t")
            .scheme(None::<String>)
            .apply(&mut req)
            .unwrap();
        assert_eq!(req.header("Authorization"), Some("t"));
    }

    #[test]
    fn test_header_auth_with_extra_headers() {
        let mut req = request();
        HeaderAuth::new("t").extra("X", "y").apply(&mut req).unwrap();
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.header("Authorization"), Some("Bearer t"));
        assert_eq!(req.header("X"), Some("y"));
    }

    #[test]
    fn test_header_auth_custom_parameter() {
        let mut req = request();
        HeaderAuth::new("t")
            .parameter("X-Api-Key")
            .scheme(None::<String>)
            .apply(&mut req)
            .unwrap();
        assert_eq!(req.header("x-api-key"), Some("t"));
    }

    #[test]
    fn test_query_parameter_auth() {
        let mut req = request();
        req.params = QueryParams::new().with("age", "27");
        QueryParameterAuth::new("apikey", "secret")
            .apply(&mut req)
            .unwrap();
        assert_eq!(
            req.params,
            QueryParams::new().with("age", "27").with("apikey", "secret")
        );
    }

    #[test]
    fn test_query_parameter_auth_overwrites() {
        let mut req = request();
        req.params = QueryParams::new().with("apikey", "stale");
        QueryParameterAuth::new("apikey", "secret")
            .apply(&mut req)
            .unwrap();
        assert_eq!(req.params.get("apikey"), Some(&ParamValue::from("secret")));
    }

    #[test]
    fn test_basic_auth() {
        let mut req = request();
        BasicAuth::new("uname", "password").apply(&mut req).unwrap();
        assert_eq!(
            req.header("Authorization"),
            Some("Basic dW5hbWU6cGFzc3dvcmQ=")
        );
    }

    #[test]
    fn test_no_auth_leaves_request_untouched() {
        let mut req = request();
        NoAuth.apply(&mut req).unwrap();
        assert!(req.headers.is_empty());
        assert!(req.params.is_empty());
    }

    #[test]
    fn test_parse_set_cookie() {
        assert_eq!(
            parse_set_cookie("session=abc; Path=/; HttpOnly"),
            Some(("session".to_string(), "abc".to_string()))
        );
        assert_eq!(parse_set_cookie("garbage"), None);
    }

    struct LoginTransport {
        status: u16,
        seen: Mutex<Vec<Request>>,
    }

    #[async_trait]
    impl Transport for LoginTransport {
        async fn send(&self, request: Request) -> Result<RawResponse> {
            let url = request.url.clone();
            self.seen.lock().unwrap().push(request);
            let mut headers = HeaderMap::new();
            headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1; Path=/"));
            headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
            Ok(RawResponse::new(self.status, headers, "", url))
        }
    }

    #[tokio::test]
    async fn test_cookie_auth_logs_in_once_and_attaches_cookies() {
        let transport = LoginTransport {
            status: 200,
            seen: Mutex::new(Vec::new()),
        };
        let mut auth = CookieAuth::new("https://api.example.com/login", HeaderAuth::new("t"));
        auth.initialize(&transport, &DefaultErrorHandler, Duration::from_secs(1))
            .await
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].header("Authorization"), Some("Bearer t"));

        let mut req = request();
        auth.apply(&mut req).unwrap();
        assert_eq!(req.header("Cookie"), Some("a=1; b=2"));
    }

    #[tokio::test]
    async fn test_cookie_auth_failure_is_fatal() {
        let transport = LoginTransport {
            status: 401,
            seen: Mutex::new(Vec::new()),
        };
        let mut auth = CookieAuth::new("https://api.example.com/login", NoAuth);
        let err = auth
            .initialize(&transport, &DefaultErrorHandler, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(auth.cookies().is_empty());
    }
}
