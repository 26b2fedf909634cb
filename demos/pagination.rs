//! Example demonstrating pagination.
//!
//! This example shows how to:
//! - Page through an endpoint with a query-parameter cursor
//! - Consume pages one at a time as a stream
//! - Collect every page at once
//!
//! Run with: `cargo run --example pagination`

use futures::StreamExt;
use pipeclient::pagination::ByQueryParams;
use pipeclient::{Client, Error, QueryParams};
use serde::Deserialize;

const API: &str = "https://jsonplaceholder.typicode.com";
const LAST_PAGE: u32 = 3;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    id: u32,
    title: String,
}

/// Moves to the next `_page` until an empty page or `LAST_PAGE`.
fn next_page(page: &Vec<Post>, previous: &QueryParams) -> Result<Option<QueryParams>, Error> {
    if page.is_empty() {
        return Ok(None);
    }

    let current: u32 = previous
        .get("_page")
        .and_then(|value| value.values().next())
        .and_then(|value| value.parse().ok())
        .unwrap_or(1);

    if current >= LAST_PAGE {
        return Err(Error::NoMorePages);
    }
    Ok(Some(QueryParams::new().with("_page", (current + 1).to_string())))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("pipeclient=debug")
        .init();

    let client = Client::builder().build().await?;
    let url = format!("{}/posts", API);
    let first = QueryParams::new().with("_page", "1").with("_limit", "5");

    println!("=== Streaming Pages ===");
    let mut pages = client.paginate(&url, Some(first.clone()), ByQueryParams(next_page));
    let mut number = 0;
    while let Some(page) = pages.next().await {
        let page: Vec<Post> = page?;
        number += 1;
        let ids: Vec<u32> = page.iter().map(|post| post.id).collect();
        println!("Page {}: posts {:?}", number, ids);
    }
    println!();

    println!("=== Collecting Pages ===");
    let all: Vec<Vec<Post>> = client
        .paginate(&url, Some(first), ByQueryParams(next_page))
        .collect_all()
        .await?;
    let total: usize = all.iter().map(Vec::len).sum();
    println!("Fetched {} posts across {} pages", total, all.len());

    Ok(())
}
