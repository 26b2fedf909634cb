//! Basic example demonstrating simple read and create calls.
//!
//! This example shows how to:
//! - Build a client with the default strategies
//! - Read a resource with a GET request
//! - Create a resource with a POST request
//! - Pass query parameters with a call
//!
//! Run with: `cargo run --example basic_call`

use pipeclient::{Client, Error, QueryParams};
use serde::{Deserialize, Serialize};

const API: &str = "https://jsonplaceholder.typicode.com";

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("pipeclient=debug,basic_call=info")
        .init();

    let client = Client::builder()
        .default_header("User-Agent", "pipeclient-example/0.1")?
        .build()
        .await?;

    println!("=== Read Example ===");
    let post: Post = client.read(&format!("{}/posts/1", API), None).await?;

    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!("Body: {}", post.body);
    println!();

    println!("=== Create Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };

    let created: Post = client
        .create(&format!("{}/posts", API), &new_post, None)
        .await?;

    println!("Created post ID: {}", created.id);
    println!("Title: {}", created.title);
    println!();

    println!("=== Query Parameters ===");
    let params = QueryParams::new().with("userId", "1");
    let posts: Vec<Post> = client.read(&format!("{}/posts", API), Some(params)).await?;
    println!("User 1 has {} posts", posts.len());

    Ok(())
}
