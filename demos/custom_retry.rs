//! Example demonstrating retry policies and custom retry predicates.
//!
//! This example shows how to:
//! - Attach a retry policy to every call of a client
//! - Write a custom retry predicate
//! - Combine predicates with AND/OR logic
//! - Retry a single call with `RetryPolicy::run`
//!
//! Run with: `cargo run --example custom_retry`

use pipeclient::retry::{AndPredicate, OrPredicate, RetryOnConnectionError, RetryOnStatus};
use pipeclient::{Client, Error, RetryPolicy, RetryPredicate};
use std::time::Duration;

const API: &str = "https://jsonplaceholder.typicode.com";

/// Custom predicate: only retry for the first N attempts
struct MaxAttempts(usize);

impl RetryPredicate for MaxAttempts {
    fn should_retry(&self, _error: &Error, attempt: usize) -> bool {
        attempt <= self.0
    }
}

/// Custom predicate: retry when the error body mentions one of the patterns
struct RetryOnErrorMessage {
    patterns: Vec<String>,
}

impl RetryPredicate for RetryOnErrorMessage {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error
            .info()
            .is_some_and(|body| self.patterns.iter().any(|pattern| body.contains(pattern)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("pipeclient=info,custom_retry=info")
        .init();

    println!("=== Example 1: Client-wide Retry Policy ===");
    // Retries 5xx responses and lost connections for at most 30 seconds
    let client = Client::builder()
        .retry_policy(
            RetryPolicy::new()
                .max_elapsed(Some(Duration::from_secs(30)))
                .initial_delay(Duration::from_millis(100))
                .max_delay(Duration::from_secs(5)),
        )
        .build()
        .await?;

    match client
        .read::<serde_json::Value>(&format!("{}/posts/1", API), None)
        .await
    {
        Ok(post) => println!("Success! Title: {}", post["title"]),
        Err(e) => println!("Failed: {}", e),
    }
    println!();

    println!("=== Example 2: Combining Predicates with OR ===");
    // Retry on lost connections OR rate limiting
    let or_predicate = OrPredicate::new(vec![
        Box::new(RetryOnConnectionError),
        Box::new(RetryOnStatus(vec![429])),
    ]);
    let client = Client::builder()
        .retry_policy(RetryPolicy::new().predicate(or_predicate))
        .build()
        .await?;
    println!("This client retries refused connections, timeouts and HTTP 429");
    match client
        .read::<serde_json::Value>(&format!("{}/posts/2", API), None)
        .await
    {
        Ok(_) => println!("Success!"),
        Err(e) => println!("Failed: {}", e),
    }
    println!();

    println!("=== Example 3: Combining Predicates with AND ===");
    // Retry on "maintenance" responses, but only for the first 2 attempts
    let and_predicate = AndPredicate::new(vec![
        Box::new(RetryOnErrorMessage {
            patterns: vec!["maintenance".to_string(), "try again".to_string()],
        }),
        Box::new(MaxAttempts(2)),
    ]);
    let policy = RetryPolicy::new()
        .initial_delay(Duration::from_millis(50))
        .predicate(and_predicate);
    println!("Policy: {:?}", policy);
    println!();

    println!("=== Example 4: Retrying a Single Call ===");
    // A closure predicate, applied to one call instead of the whole client
    let plain = Client::builder().build().await?;
    let policy = RetryPolicy::new()
        .max_elapsed(Some(Duration::from_secs(5)))
        .predicate(|error: &Error, attempt: usize| attempt < 3 && error.is_retryable());

    let url = format!("{}/users/1", API);
    let user: serde_json::Value = policy.run(|| plain.read(&url, None)).await?;
    println!("User: {}", user["name"]);

    Ok(())
}
