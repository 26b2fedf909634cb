//! Example demonstrating error handling.
//!
//! This example shows how to:
//! - Match on the status band of an error
//! - Match a single status through its kind
//! - Deal with decoding failures on successful responses
//! - Tell transport failures apart from HTTP errors
//!
//! Run with: `cargo run --example error_handling`

use pipeclient::{Band, Client, Error, ErrorKind, UnexpectedReason};
use serde::Deserialize;
use std::time::Duration;

const API: &str = "https://jsonplaceholder.typicode.com";

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    id: u32,
    title: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("pipeclient=info")
        .init();

    let client = Client::builder().build().await?;

    println!("=== Example 1: Handling HTTP Errors ===");
    // A non-existent resource answers 404
    match client.read::<Post>(&format!("{}/posts/999999", API), None).await {
        Ok(post) => println!("Success: {:?}", post),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            println!("Not found!");
            println!("  Message: {}", e);
            println!("  Status code: {:?}", e.status());
            println!("  Body: {:?}", e.info());
            println!("  Retryable: {}", e.is_retryable());
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 2: Matching on the Band ===");
    match client.read::<Post>(&format!("{}/nowhere", API), None).await {
        Err(Error::Client { status, .. }) => println!("Rejected by the server ({})", status),
        Err(Error::Server { status, .. }) => println!("Server trouble ({})", status),
        Err(e) if e.band() == Band::Redirection => println!("Unfollowed redirect: {}", e),
        other => println!("Unexpected outcome: {:?}", other.map(|p| p.id)),
    }
    println!();

    println!("=== Example 3: Handling Decoding Errors ===");
    // A struct that doesn't match the response
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct WrongSchema {
        nonexistent_field: String,
    }

    match client.read::<WrongSchema>(&format!("{}/posts/1", API), None).await {
        Ok(data) => println!("Unexpectedly decoded: {:?}", data),
        Err(Error::Unexpected {
            reason: UnexpectedReason::Decoding,
            status,
            message,
            ..
        }) => {
            println!("Decoding failed (status {:?})", status);
            println!("  {}", message);
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 4: Transport Failures ===");
    let impatient = Client::builder()
        .timeout(Duration::from_millis(1))
        .build()
        .await?;

    match impatient.read::<Post>(&format!("{}/posts/1", API), None).await {
        Ok(post) => println!("Fast network! {:?}", post),
        Err(e) => match e.unexpected_reason() {
            Some(reason) if reason.is_connection_failure() => {
                println!("No response received ({}): {}", reason, e)
            }
            _ => println!("Other error: {}", e),
        },
    }

    Ok(())
}
