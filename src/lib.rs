//! # pipeclient - typed clients over third-party HTTP APIs
//!
//! pipeclient factors the cross-cutting parts of an API client into a
//! request pipeline, so a consumer only writes endpoint-specific methods.
//! Every call runs the same stages:
//!
//! 1. an [`Authentication`] strategy adds credentials,
//! 2. a [`RequestFormatter`] encodes the body,
//! 3. a [`Transport`] sends the request,
//! 4. an [`ErrorHandler`] turns unsuccessful statuses into a typed [`Error`],
//! 5. a [`ResponseHandler`] decodes the successful response.
//!
//! [`RetryPolicy`] and [`Paginator`] wrap whole calls on top of that.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pipeclient::{auth::HeaderAuth, Client, QueryParams, RetryPolicy};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     email: String,
//! }
//!
//! struct UsersApi {
//!     client: Client,
//! }
//!
//! impl UsersApi {
//!     async fn user(&self, id: u64) -> pipeclient::Result<User> {
//!         let url = format!("https://api.example.com/users/{}", id);
//!         self.client.read(&url, None).await
//!     }
//!
//!     async fn add(&self, user: &CreateUser) -> pipeclient::Result<User> {
//!         self.client
//!             .create("https://api.example.com/users", user, None)
//!             .await
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pipeclient::Error> {
//!     let client = Client::builder()
//!         .authentication(HeaderAuth::new("my-token"))
//!         .retry_policy(RetryPolicy::default())
//!         .build()
//!         .await?;
//!     let api = UsersApi { client };
//!
//!     let user = api.user(123).await?;
//!     println!("User: {}", user.name);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every failure is one [`Error`] value. Match on the band variant to catch
//! broadly, or on [`Error::kind`] to catch a single status:
//!
//! ```no_run
//! use pipeclient::{Client, Error, ErrorKind};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().build().await?;
//! match client.read::<serde_json::Value>("https://api.example.com/endpoint", None).await {
//!     Ok(data) => println!("Success: {:?}", data),
//!     Err(e) if e.kind() == ErrorKind::NotFound => println!("No such thing"),
//!     Err(Error::Client { status, info, .. }) => eprintln!("Rejected ({}): {}", status, info),
//!     Err(Error::Server { message, .. }) => eprintln!("Server trouble: {}", message),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
mod classify;
mod client;
mod error;
pub mod format;
pub mod handler;
pub mod pagination;
mod request;
mod response;
pub mod retry;
mod transport;

pub use auth::Authentication;
pub use classify::{DefaultErrorHandler, ErrorHandler};
pub use client::{Client, ClientBuilder, DEFAULT_TIMEOUT};
pub use error::{Band, BoxError, Error, ErrorKind, Result, UnexpectedReason};
pub use format::RequestFormatter;
pub use handler::ResponseHandler;
pub use pagination::Paginator;
pub use request::{ParamValue, QueryParams, Request};
pub use response::RawResponse;
pub use retry::{RetryPolicy, RetryPredicate};
pub use transport::{ReqwestTransport, Transport};
