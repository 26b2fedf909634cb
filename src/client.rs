//! The request pipeline and its builder.
//!
//! [`Client`] composes the strategies chosen at build time into the
//! `create`/`read`/`replace`/`update`/`delete` operations. Each call runs
//! authentication, formatting, transport, classification and decoding in
//! that order; nothing but the strategies themselves outlives a call.

use crate::{
    auth::{Authentication, NoAuth},
    classify::{check_response, DefaultErrorHandler, ErrorHandler},
    error::UnexpectedReason,
    format::{JsonFormatter, RequestFormatter},
    handler::{JsonHandler, ResponseHandler},
    request::{parse_header, ParamValue, QueryParams, Request},
    retry::RetryPolicy,
    transport::{ReqwestTransport, Transport},
    Error, Result,
};
use http::{HeaderMap, Method};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Default time to wait for a response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A typed client over a third-party HTTP API.
///
/// The client is cheap to clone and is designed to be reused across many
/// calls. `H` is the [`ResponseHandler`] that decodes successful responses;
/// the output type of each call is chosen at the call site.
///
/// # Examples
///
/// ```no_run
/// use pipeclient::{auth::HeaderAuth, Client, QueryParams};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
/// }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), pipeclient::Error> {
/// let client = Client::builder()
///     .authentication(HeaderAuth::new("my-token"))
///     .build()
///     .await?;
///
/// let user: User = client
///     .read("https://api.example.com/users/123", None)
///     .await?;
/// println!("User: {}", user.name);
///
/// let params = QueryParams::new().with("notify", "false");
/// let created: User = client
///     .create(
///         "https://api.example.com/users",
///         &CreateUser { name: "Alice".to_string() },
///         Some(params),
///     )
///     .await?;
/// println!("Created user with ID: {}", created.id);
/// # Ok(())
/// # }
/// ```
pub struct Client<H = JsonHandler> {
    pub(crate) inner: Arc<ClientInner<H>>,
}

pub(crate) struct ClientInner<H> {
    transport: Box<dyn Transport>,
    authentication: Box<dyn Authentication>,
    request_formatter: Box<dyn RequestFormatter>,
    error_handler: Box<dyn ErrorHandler>,
    response_handler: H,
    default_headers: HeaderMap,
    default_query_params: QueryParams,
    timeout: Duration,
    retry_policy: Option<RetryPolicy>,
}

impl<H> Clone for Client<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<H> Client<H> {
    /// The timeout applied to every request.
    pub fn request_timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Makes a typed HTTP request.
    ///
    /// This is the general form behind the method-specific operations. If
    /// the client was built with a [`RetryPolicy`] the whole pipeline is
    /// retried under it.
    ///
    /// # Errors
    ///
    /// Returns the typed [`Error`] produced by whichever stage failed.
    pub async fn call<B, T>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        params: Option<QueryParams>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        H: ResponseHandler<T>,
    {
        tracing::info!(method = %method, url = %endpoint, "Calling endpoint");

        let payload = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| {
                Error::caused_by(UnexpectedReason::Formatting, "Failed to serialize request", e)
            })?;

        match &self.inner.retry_policy {
            Some(policy) => {
                policy
                    .run(|| self.execute(&method, endpoint, payload.as_ref(), params.as_ref()))
                    .await
            }
            None => {
                self.execute(&method, endpoint, payload.as_ref(), params.as_ref())
                    .await
            }
        }
    }

    /// Runs one pass of the pipeline.
    async fn execute<T>(
        &self,
        method: &Method,
        endpoint: &str,
        payload: Option<&serde_json::Value>,
        params: Option<&QueryParams>,
    ) -> Result<T>
    where
        H: ResponseHandler<T>,
    {
        let inner = &self.inner;

        let mut request = Request::new(method.clone(), endpoint, inner.timeout);
        request.headers = inner.default_headers.clone();
        request.params = inner.default_query_params.clone();
        if let Some(params) = params {
            request.params.merge(params.clone());
        }

        inner.authentication.apply(&mut request)?;

        if let Some(payload) = payload {
            let formatted = inner.request_formatter.format(payload)?;
            request.headers.extend(formatted.headers);
            request.body = Some(formatted.body);
        }

        let response = inner.transport.send(request).await.map_err(|e| {
            tracing::warn!(error = %e, method = %method, url = %endpoint, "Request failed");
            e
        })?;

        check_response(inner.error_handler.as_ref(), &response)?;

        inner.response_handler.decode(response)
    }

    /// Sends data and returns the decoded response from a POST endpoint.
    pub async fn create<B, T>(&self, endpoint: &str, data: &B, params: Option<QueryParams>) -> Result<T>
    where
        B: Serialize + ?Sized,
        H: ResponseHandler<T>,
    {
        self.call(Method::POST, endpoint, Some(data), params).await
    }

    /// Returns the decoded response from a GET endpoint.
    pub async fn read<T>(&self, endpoint: &str, params: Option<QueryParams>) -> Result<T>
    where
        H: ResponseHandler<T>,
    {
        self.call::<(), T>(Method::GET, endpoint, None, params).await
    }

    /// Sends data to overwrite a resource with PUT.
    pub async fn replace<B, T>(&self, endpoint: &str, data: &B, params: Option<QueryParams>) -> Result<T>
    where
        B: Serialize + ?Sized,
        H: ResponseHandler<T>,
    {
        self.call(Method::PUT, endpoint, Some(data), params).await
    }

    /// Sends data to partially update a resource with PATCH.
    pub async fn update<B, T>(&self, endpoint: &str, data: &B, params: Option<QueryParams>) -> Result<T>
    where
        B: Serialize + ?Sized,
        H: ResponseHandler<T>,
    {
        self.call(Method::PATCH, endpoint, Some(data), params).await
    }

    /// Removes a resource with DELETE.
    pub async fn delete<T>(&self, endpoint: &str, params: Option<QueryParams>) -> Result<T>
    where
        H: ResponseHandler<T>,
    {
        self.call::<(), T>(Method::DELETE, endpoint, None, params).await
    }

    /// Alias for [`Client::create`].
    pub async fn post<B, T>(&self, endpoint: &str, data: &B, params: Option<QueryParams>) -> Result<T>
    where
        B: Serialize + ?Sized,
        H: ResponseHandler<T>,
    {
        self.create(endpoint, data, params).await
    }

    /// Alias for [`Client::read`].
    pub async fn get<T>(&self, endpoint: &str, params: Option<QueryParams>) -> Result<T>
    where
        H: ResponseHandler<T>,
    {
        self.read(endpoint, params).await
    }

    /// Alias for [`Client::replace`].
    pub async fn put<B, T>(&self, endpoint: &str, data: &B, params: Option<QueryParams>) -> Result<T>
    where
        B: Serialize + ?Sized,
        H: ResponseHandler<T>,
    {
        self.replace(endpoint, data, params).await
    }

    /// Alias for [`Client::update`].
    pub async fn patch<B, T>(&self, endpoint: &str, data: &B, params: Option<QueryParams>) -> Result<T>
    where
        B: Serialize + ?Sized,
        H: ResponseHandler<T>,
    {
        self.update(endpoint, data, params).await
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// Every strategy has a default: no authentication, JSON formatting, JSON
/// decoding, the status-band error handler and a `reqwest` transport.
///
/// # Examples
///
/// ```no_run
/// use pipeclient::{auth::QueryParameterAuth, handler::XmlHandler, ClientBuilder, RetryPolicy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), pipeclient::Error> {
/// let client = ClientBuilder::new()
///     .authentication(QueryParameterAuth::new("apikey", "secret"))
///     .response_handler(XmlHandler)
///     .timeout(Duration::from_secs(30))
///     .retry_policy(RetryPolicy::default())
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder<H = JsonHandler> {
    transport: Option<Box<dyn Transport>>,
    authentication: Box<dyn Authentication>,
    request_formatter: Box<dyn RequestFormatter>,
    error_handler: Box<dyn ErrorHandler>,
    response_handler: H,
    default_headers: HeaderMap,
    default_query_params: QueryParams,
    timeout: Duration,
    retry_policy: Option<RetryPolicy>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            transport: None,
            authentication: Box::new(NoAuth),
            request_formatter: Box::new(JsonFormatter),
            error_handler: Box::new(DefaultErrorHandler),
            response_handler: JsonHandler,
            default_headers: HeaderMap::new(),
            default_query_params: QueryParams::new(),
            timeout: DEFAULT_TIMEOUT,
            retry_policy: None,
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ClientBuilder<H> {
    /// Sets the authentication strategy.
    pub fn authentication(mut self, authentication: impl Authentication + 'static) -> Self {
        self.authentication = Box::new(authentication);
        self
    }

    /// Sets the request body formatter.
    pub fn request_formatter(mut self, formatter: impl RequestFormatter + 'static) -> Self {
        self.request_formatter = Box::new(formatter);
        self
    }

    /// Sets the error handler.
    pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Box::new(handler);
        self
    }

    /// Sets the transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Sets the response handler, changing the client's decoding.
    pub fn response_handler<H2>(self, handler: H2) -> ClientBuilder<H2> {
        ClientBuilder {
            transport: self.transport,
            authentication: self.authentication,
            request_formatter: self.request_formatter,
            error_handler: self.error_handler,
            response_handler: handler,
            default_headers: self.default_headers,
            default_query_params: self.default_query_params,
            timeout: self.timeout,
            retry_policy: self.retry_policy,
        }
    }

    /// Sets the request timeout (default 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retries every call made by the client under `policy`.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Adds a default query parameter that will be included in all requests.
    pub fn default_query_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.default_query_params.insert(key, value);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// Runs the authentication strategy's one-time initialization, which for
    /// [`CookieAuth`](crate::auth::CookieAuth) performs the login request.
    ///
    /// # Errors
    ///
    /// Returns an error if the default transport cannot be created or if
    /// authentication initialization fails.
    pub async fn build(self) -> Result<Client<H>> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Box::new(ReqwestTransport::new()?),
        };

        let mut authentication = self.authentication;
        authentication
            .initialize(transport.as_ref(), self.error_handler.as_ref(), self.timeout)
            .await?;

        tracing::debug!(timeout_ms = self.timeout.as_millis(), "Built API client");

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                authentication,
                request_formatter: self.request_formatter,
                error_handler: self.error_handler,
                response_handler: self.response_handler,
                default_headers: self.default_headers,
                default_query_params: self.default_query_params,
                timeout: self.timeout,
                retry_policy: self.retry_policy,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{HeaderAuth, QueryParameterAuth};
    use crate::error::{Band, ErrorKind};
    use crate::handler::RawHandler;
    use crate::response::RawResponse;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers with a canned status and records every request it sees.
    struct Scripted {
        statuses: Mutex<Vec<u16>>,
        seen: Arc<Mutex<Vec<Request>>>,
    }

    impl Scripted {
        fn new(statuses: Vec<u16>) -> (Self, Arc<Mutex<Vec<Request>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let transport = Self {
                statuses: Mutex::new(statuses),
                seen: Arc::clone(&seen),
            };
            (transport, seen)
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, request: Request) -> Result<RawResponse> {
            let status = {
                let mut statuses = self.statuses.lock().unwrap();
                if statuses.len() > 1 {
                    statuses.remove(0)
                } else {
                    statuses[0]
                }
            };
            let body = request.body.clone().unwrap_or_default();
            let url = request.url.clone();
            self.seen.lock().unwrap().push(request);
            Ok(RawResponse::new(status, HeaderMap::new(), body, url))
        }
    }

    /// Returns the request body as the response body.
    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, request: Request) -> Result<RawResponse> {
            let body = request.body.unwrap_or_default();
            Ok(RawResponse::new(200, request.headers, body, request.url))
        }
    }

    struct Refused(AtomicUsize);

    #[async_trait]
    impl Transport for Refused {
        async fn send(&self, request: Request) -> Result<RawResponse> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(Error::unexpected(
                UnexpectedReason::Connect,
                format!("Error when contacting '{}'", request.url),
            ))
        }
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestData {
        id: u32,
        name: String,
    }

    fn test_data() -> TestData {
        TestData {
            id: 1,
            name: "Test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_json_round_trip_through_echo() {
        let client = Client::builder().transport(Echo).build().await.unwrap();
        let echoed: TestData = client
            .create("https://api.example.com/echo", &test_data(), None)
            .await
            .unwrap();
        assert_eq!(echoed, test_data());
    }

    #[tokio::test]
    async fn test_pipeline_applies_auth_defaults_and_formatting() {
        let (transport, seen) = Scripted::new(vec![200]);
        let client = Client::builder()
            .transport(transport)
            .authentication(QueryParameterAuth::new("apikey", "secret"))
            .default_query_param("lang", "en")
            .default_header("User-Agent", "test-agent")
            .unwrap()
            .timeout(Duration::from_secs(3))
            .build()
            .await
            .unwrap();

        let _: serde_json::Value = client
            .update(
                "https://api.example.com/users/1",
                &test_data(),
                Some(QueryParams::new().with("age", "27")),
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let request = &seen[0];
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(request.timeout, Duration::from_secs(3));
        assert_eq!(request.header("user-agent"), Some("test-agent"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(
            request.params,
            QueryParams::new()
                .with("age", "27")
                .with("apikey", "secret")
                .with("lang", "en")
        );
    }

    #[tokio::test]
    async fn test_bodyless_methods_skip_formatting() {
        let (transport, seen) = Scripted::new(vec![204]);
        let client = Client::builder()
            .transport(transport)
            .authentication(HeaderAuth::new("t"))
            .build()
            .await
            .unwrap();

        let _: () = client.delete("https://api.example.com/users/1", None).await.unwrap();
        let _: () = client.read("https://api.example.com/users", None).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::DELETE);
        assert_eq!(seen[1].method, Method::GET);
        for request in seen.iter() {
            assert!(request.body.is_none());
            assert!(request.header("content-type").is_none());
            assert_eq!(request.header("authorization"), Some("Bearer t"));
        }
    }

    #[tokio::test]
    async fn test_default_timeout() {
        let client = Client::builder().transport(Echo).build().await.unwrap();
        assert_eq!(client.request_timeout(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_non_success_is_classified_and_not_decoded() {
        let (transport, _) = Scripted::new(vec![404]);
        let client = Client::builder().transport(transport).build().await.unwrap();

        let err = client
            .read::<TestData>("https://api.example.com/missing", None)
            .await
            .unwrap_err();

        assert_eq!(err.band(), Band::Client);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            err.to_string(),
            "404 Error: Not Found for url: https://api.example.com/missing"
        );
    }

    #[tokio::test]
    async fn test_success_with_bad_body_is_decode_error() {
        let (transport, _) = Scripted::new(vec![200]);
        let client = Client::builder().transport(transport).build().await.unwrap();

        // Scripted echoes the body back: a JSON string, not a `TestData`.
        let err = client
            .call::<str, TestData>(Method::POST, "https://api.example.com/x", Some("not json"), None)
            .await
            .unwrap_err();
        assert_eq!(err.unexpected_reason(), Some(UnexpectedReason::Decoding));
        assert_eq!(err.status(), Some(200));
    }

    #[tokio::test]
    async fn test_raw_handler_returns_wrapper() {
        let (transport, _) = Scripted::new(vec![201]);
        let client = Client::builder()
            .transport(transport)
            .response_handler(RawHandler)
            .build()
            .await
            .unwrap();

        let response: RawResponse = client
            .create("https://api.example.com/users", &test_data(), None)
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        assert_eq!(response.url(), "https://api.example.com/users");
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_retry_policy_retries_server_errors() {
        let (transport, seen) = Scripted::new(vec![500, 502, 200]);
        let client = Client::builder()
            .transport(transport)
            .retry_policy(RetryPolicy::unbounded())
            .build()
            .await
            .unwrap();

        let _: () = client.read("https://api.example.com/flaky", None).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_retry_policy_skips_client_errors() {
        let (transport, seen) = Scripted::new(vec![400]);
        let client = Client::builder()
            .transport(transport)
            .retry_policy(RetryPolicy::unbounded())
            .build()
            .await
            .unwrap();

        let err = client
            .read::<()>("https://api.example.com/bad", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failure_is_retried_until_budget() {
        let client = Client::builder()
            .transport(Refused(AtomicUsize::new(0)))
            .retry_policy(
                RetryPolicy::default()
                    .max_elapsed(Some(Duration::from_secs(1)))
                    .initial_delay(Duration::from_millis(400))
                    .jitter(false),
            )
            .build()
            .await
            .unwrap();

        let err = client
            .read::<()>("https://api.example.com/down", None)
            .await
            .unwrap_err();
        assert_eq!(err.unexpected_reason(), Some(UnexpectedReason::Connect));
        assert!(err.status().is_none());
    }

    #[tokio::test]
    async fn test_client_is_clone() {
        let client = Client::builder().transport(Echo).build().await.unwrap();
        let copy = client.clone();
        let echoed: TestData = copy
            .replace("https://api.example.com/echo", &test_data(), None)
            .await
            .unwrap();
        assert_eq!(echoed, test_data());
    }
}
