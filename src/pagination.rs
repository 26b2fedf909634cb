//! Cursor-based pagination over read operations.
//!
//! A [`Paginator`] fetches pages one after another with [`Client::read`],
//! asking a [`PageStrategy`] after each page where the next one lives. Two
//! strategies are provided: [`ByQueryParams`] advances a query-parameter
//! cursor, [`ByUrl`] follows a next-page URL.
//!
//! Iteration stops when the advance function returns `Ok(None)` or
//! `Err(Error::NoMorePages)`. Repeated cursors are not detected: the advance
//! function is responsible for eventually signalling the end.

use crate::client::Client;
use crate::error::{Error, Result};
use crate::handler::ResponseHandler;
use crate::request::QueryParams;
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Where a page is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    /// The page URL.
    pub url: String,
    /// The page's query parameters.
    pub params: QueryParams,
}

/// Computes the next page location from the page just fetched.
pub trait PageStrategy<T> {
    /// Returns the next location, or `None` when there are no more pages.
    fn advance(&mut self, page: &T, current: &PageLocation) -> Result<Option<PageLocation>>;
}

/// Pages addressed by query parameters.
///
/// The function receives the decoded page and the parameters used to fetch
/// it, and returns the parameters to change for the next page. They are
/// merged over the current parameters. `None` or an empty set ends
/// iteration.
///
/// # Examples
///
/// ```no_run
/// use pipeclient::pagination::ByQueryParams;
/// use pipeclient::{Client, QueryParams};
/// use serde_json::Value;
///
/// # async fn example() -> Result<(), pipeclient::Error> {
/// let client = Client::builder().build().await?;
/// let pages: Vec<Value> = client
///     .paginate(
///         "https://api.example.com/users",
///         None,
///         ByQueryParams(|page: &Value, _previous: &QueryParams| {
///             Ok::<_, pipeclient::Error>(
///                 page["next"]
///                     .as_str()
///                     .map(|next| QueryParams::new().with("page", next)),
///             )
///         }),
///     )
///     .collect_all()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ByQueryParams<F>(pub F);

impl<T, F> PageStrategy<T> for ByQueryParams<F>
where
    F: FnMut(&T, &QueryParams) -> Result<Option<QueryParams>>,
{
    fn advance(&mut self, page: &T, current: &PageLocation) -> Result<Option<PageLocation>> {
        let next = match (self.0)(page, &current.params)? {
            Some(next) if !next.is_empty() => next,
            _ => return Ok(None),
        };

        let mut params = current.params.clone();
        params.merge(next);
        Ok(Some(PageLocation {
            url: current.url.clone(),
            params,
        }))
    }
}

/// Pages addressed by URL.
///
/// The function receives the decoded page and the URL it was fetched from,
/// and returns the next page's URL. `None` or an empty string ends
/// iteration. The original query parameters are sent with every page.
pub struct ByUrl<F>(pub F);

impl<T, F> PageStrategy<T> for ByUrl<F>
where
    F: FnMut(&T, &str) -> Result<Option<String>>,
{
    fn advance(&mut self, page: &T, current: &PageLocation) -> Result<Option<PageLocation>> {
        match (self.0)(page, &current.url)? {
            Some(url) if !url.is_empty() => Ok(Some(PageLocation {
                url,
                params: current.params.clone(),
            })),
            _ => Ok(None),
        }
    }
}

enum State<S> {
    Next(PageLocation, S),
    Failed(Error),
    Done,
}

/// A stream of decoded pages.
///
/// Yields each page in order. An error from a page fetch or from the advance
/// function is yielded once, after which the stream ends. The paginator is
/// `Send` and can be driven from a spawned task.
pub struct Paginator<'a, T> {
    pages: BoxStream<'a, Result<T>>,
}

impl<'a, T: Send + 'a> Paginator<'a, T> {
    fn new<H, S>(client: &'a Client<H>, start: PageLocation, strategy: S) -> Self
    where
        H: ResponseHandler<T>,
        S: PageStrategy<T> + Send + 'a,
    {
        let pages = stream::unfold(State::Next(start, strategy), move |state| async move {
            let (location, mut strategy) = match state {
                State::Next(location, strategy) => (location, strategy),
                State::Failed(error) => return Some((Err(error), State::Done)),
                State::Done => return None,
            };

            tracing::debug!(url = %location.url, "Fetching page");
            let page = match client
                .read::<T>(&location.url, Some(location.params.clone()))
                .await
            {
                Ok(page) => page,
                Err(error) => return Some((Err(error), State::Done)),
            };

            let next = match strategy.advance(&page, &location) {
                Ok(Some(next)) => State::Next(next, strategy),
                Ok(None) | Err(Error::NoMorePages) => {
                    tracing::debug!("No further pages");
                    State::Done
                }
                Err(error) => State::Failed(error),
            };
            Some((Ok(page), next))
        });

        Self {
            pages: pages.boxed(),
        }
    }

    /// Fetches every remaining page.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; pages fetched before it are
    /// discarded.
    pub async fn collect_all(self) -> Result<Vec<T>> {
        self.pages.try_collect().await
    }
}

impl<T> Stream for Paginator<'_, T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.pages.as_mut().poll_next(cx)
    }
}

impl<H> Client<H> {
    /// Reads a paginated endpoint page by page.
    ///
    /// Each page is an independent pipeline call, so a client-wide
    /// [`RetryPolicy`](crate::RetryPolicy) applies per page.
    pub fn paginate<'a, T, S>(
        &'a self,
        endpoint: impl Into<String>,
        params: Option<QueryParams>,
        strategy: S,
    ) -> Paginator<'a, T>
    where
        T: Send + 'a,
        H: ResponseHandler<T>,
        S: PageStrategy<T> + Send + 'a,
    {
        let start = PageLocation {
            url: endpoint.into(),
            params: params.unwrap_or_default(),
        };
        Paginator::new(self, start, strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ParamValue, Request};
    use crate::response::RawResponse;
    use crate::transport::Transport;
    use async_trait::async_trait;
    use http::HeaderMap;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    /// Serves `pages` in order and records the requests.
    struct Pages {
        pages: Mutex<Vec<(u16, Value)>>,
        seen: Arc<Mutex<Vec<Request>>>,
    }

    #[async_trait]
    impl Transport for Pages {
        async fn send(&self, request: Request) -> Result<RawResponse> {
            let (status, body) = self.pages.lock().unwrap().remove(0);
            let url = request.url.clone();
            self.seen.lock().unwrap().push(request);
            Ok(RawResponse::new(status, HeaderMap::new(), body.to_string(), url))
        }
    }

    async fn client(pages: Vec<(u16, Value)>) -> (Client, Arc<Mutex<Vec<Request>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let transport = Pages {
            pages: Mutex::new(pages),
            seen: Arc::clone(&seen),
        };
        let client = Client::builder().transport(transport).build().await.unwrap();
        (client, seen)
    }

    fn next_page_param(page: &Value, _previous: &QueryParams) -> Result<Option<QueryParams>> {
        Ok(page["next"]
            .as_str()
            .map(|next| QueryParams::new().with("page", next)))
    }

    #[tokio::test]
    async fn test_query_param_pagination() {
        let bodies = vec![
            json!({"page1": "data", "next": "page2"}),
            json!({"page2": "data", "next": "page3"}),
            json!({"page3": "data", "next": null}),
        ];
        let (client, seen) = client(bodies.iter().cloned().map(|b| (200, b)).collect()).await;

        let pages: Vec<Value> = client
            .paginate(
                "https://api.example.com/items",
                Some(QueryParams::new().with("limit", "10")),
                ByQueryParams(next_page_param),
            )
            .collect_all()
            .await
            .unwrap();

        assert_eq!(pages, bodies);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].params.get("page"), None);
        assert_eq!(seen[1].params.get("page"), Some(&ParamValue::from("page2")));
        assert_eq!(seen[2].params.get("page"), Some(&ParamValue::from("page3")));
        assert!(seen.iter().all(|r| r.params.get("limit") == Some(&ParamValue::from("10"))));
    }

    #[tokio::test]
    async fn test_url_pagination() {
        let bodies = vec![
            json!({"page1": "data", "next": "https://api.example.com/items/page2"}),
            json!({"page2": "data", "next": null}),
        ];
        let (client, seen) = client(bodies.iter().cloned().map(|b| (200, b)).collect()).await;

        let pages: Vec<Value> = client
            .paginate(
                "https://api.example.com/items",
                None,
                ByUrl(|page: &Value, _previous: &str| -> Result<Option<String>> {
                    Ok(page["next"].as_str().map(str::to_string))
                }),
            )
            .collect_all()
            .await
            .unwrap();

        assert_eq!(pages, bodies);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].url, "https://api.example.com/items");
        assert_eq!(seen[1].url, "https://api.example.com/items/page2");
    }

    #[tokio::test]
    async fn test_no_more_pages_signal_terminates() {
        let (client, seen) = client(vec![
            (200, json!({"n": 1})),
            (200, json!({"n": 2})),
        ])
        .await;

        let pages: Vec<Value> = client
            .paginate(
                "https://api.example.com/items",
                None,
                ByQueryParams(|page: &Value, _previous: &QueryParams| -> Result<Option<QueryParams>> {
                    if page["n"] == 2 {
                        return Err(Error::NoMorePages);
                    }
                    Ok(Some(QueryParams::new().with("n", "2")))
                }),
            )
            .collect_all()
            .await
            .unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_page_error_propagates_and_ends_stream() {
        let (client, _) = client(vec![
            (200, json!({"next": "2"})),
            (503, json!({"error": "down"})),
        ])
        .await;

        let mut pages = client.paginate(
            "https://api.example.com/items",
            None,
            ByQueryParams(next_page_param),
        );

        let first: Value = pages.next().await.unwrap().unwrap();
        assert_eq!(first["next"], "2");
        let err = pages.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Server { status: 503, .. }));
        assert!(pages.next().await.is_none());
    }

    #[tokio::test]
    async fn test_paginator_runs_in_spawned_task() {
        let (client, seen) = client(vec![
            (200, json!({"next": "2"})),
            (200, json!({"next": null})),
        ])
        .await;

        let handle = tokio::spawn(async move {
            let pages: Result<Vec<Value>> = client
                .paginate(
                    "https://api.example.com/items",
                    None,
                    ByQueryParams(next_page_param),
                )
                .collect_all()
                .await;
            pages
        });

        let pages = handle.await.unwrap().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_advance_error_yields_page_then_error() {
        let (client, _) = client(vec![(200, json!({"next": "2"}))]).await;

        let mut pages = client.paginate(
            "https://api.example.com/items",
            None,
            ByUrl(|_page: &Value, _previous: &str| -> Result<Option<String>> {
                Err(Error::configuration("cursor missing"))
            }),
        );

        assert!(pages.next().await.unwrap().is_ok());
        assert!(pages.next().await.unwrap().is_err());
        assert!(pages.next().await.is_none());
    }
}
