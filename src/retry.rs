//! Retry with exponential backoff for transient failures.
//!
//! A [`RetryPolicy`] wraps any pipeline call. It re-runs the call while the
//! [`RetryPredicate`] accepts the error, sleeping for an exponentially
//! growing delay between attempts, and gives up once the next sleep would
//! exceed the policy's total time budget. The last error is returned as is.

use crate::Error;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default total time budget for all attempts.
pub const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(300);

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(250);

/// Default cap on a single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Backoff and stop configuration for retried calls.
///
/// Delays grow as `initial_delay * multiplier^(attempt - 1)`, capped at
/// `max_delay`. With jitter enabled each delay is scaled by a random factor
/// in `[0.75, 1.0]`.
///
/// # Examples
///
/// ```no_run
/// use pipeclient::{Client, RetryPolicy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), pipeclient::Error> {
/// let client = Client::builder().build().await?;
/// let policy = RetryPolicy::default()
///     .max_elapsed(Some(Duration::from_secs(60)))
///     .initial_delay(Duration::from_millis(100));
///
/// let user: serde_json::Value = policy
///     .run(|| client.read("https://api.example.com/users/1", None))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    max_elapsed: Option<Duration>,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    jitter: bool,
    predicate: Arc<dyn RetryPredicate>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_elapsed: Some(DEFAULT_MAX_ELAPSED),
            initial_delay: DEFAULT_INITIAL_DELAY,
            multiplier: 2.0,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: true,
            predicate: Arc::new(RetryOnTransient),
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_elapsed", &self.max_elapsed)
            .field("initial_delay", &self.initial_delay)
            .field("multiplier", &self.multiplier)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// A policy with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that keeps retrying for as long as the predicate allows.
    pub fn unbounded() -> Self {
        Self {
            max_elapsed: None,
            ..Self::default()
        }
    }

    /// Sets the total time budget; `None` removes it.
    pub fn max_elapsed(mut self, max_elapsed: Option<Duration>) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    /// Sets the delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the growth factor between consecutive delays.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Caps a single delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enables or disables jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replaces the retry predicate.
    ///
    /// By default, errors are retried based on [`Error::is_retryable`].
    pub fn predicate(mut self, predicate: impl RetryPredicate + 'static) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Returns the delay to wait after the given failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        let delay = if secs.is_finite() && secs < self.max_delay.as_secs_f64() {
            Duration::from_secs_f64(secs.max(0.0))
        } else {
            self.max_delay
        };

        if self.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.75..=1.0);
            delay.mul_f64(jitter_factor)
        } else {
            delay
        }
    }

    /// Runs `operation`, retrying transient failures.
    ///
    /// `operation` is invoked once per attempt and must build a fresh future
    /// each time. Dropping the returned future cancels any pending backoff
    /// sleep; no further attempts are made.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> crate::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = crate::Result<T>>,
    {
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempts = attempt, "Request succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !self.predicate.should_retry(&error, attempt) {
                return Err(error);
            }

            let delay = self.delay_for_attempt(attempt);
            if let Some(max_elapsed) = self.max_elapsed {
                let exceeded = start_time
                    .elapsed()
                    .checked_add(delay)
                    .map_or(true, |resume_at| resume_at > max_elapsed);
                if exceeded {
                    tracing::warn!(
                        error = %error,
                        attempts = attempt,
                        max_elapsed_secs = max_elapsed.as_secs(),
                        "Retry budget exhausted"
                    );
                    return Err(error);
                }
            }

            tracing::warn!(
                error = %error,
                attempt = attempt,
                delay_ms = delay.as_millis(),
                "Retrying request after delay"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Binds `operation` to this policy, yielding a reusable retried call.
    pub fn wrap<F>(self, operation: F) -> Retrying<F> {
        Retrying {
            policy: self,
            operation,
        }
    }
}

/// A call bound to a [`RetryPolicy`]; see [`RetryPolicy::wrap`].
pub struct Retrying<F> {
    policy: RetryPolicy,
    operation: F,
}

impl<F, Fut, T> Retrying<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    /// Invokes the wrapped operation under the retry policy.
    pub async fn call(&mut self) -> crate::Result<T> {
        self.policy.run(&mut self.operation).await
    }
}

/// Decides whether a failed call should be retried.
///
/// Closures of the form `Fn(&Error, usize) -> bool` implement this trait.
///
/// # Examples
///
/// ```
/// use pipeclient::{Error, ErrorKind, RetryPredicate};
///
/// struct RetryOnRateLimit;
///
/// impl RetryPredicate for RetryOnRateLimit {
///     fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
///         error.kind() == ErrorKind::TooManyRequests
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Returns `true` if the call should be attempted again.
    ///
    /// `attempt` is the number of the attempt that just failed (1-indexed).
    fn should_retry(&self, error: &Error, attempt: usize) -> bool;
}

impl<F> RetryPredicate for F
where
    F: Fn(&Error, usize) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self(error, attempt)
    }
}

/// Retries server errors and failures to reach the server.
///
/// This uses [`Error::is_retryable`]. It is the default predicate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOnTransient;

impl RetryPredicate for RetryOnTransient {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.is_retryable()
    }
}

/// Retry only on 5xx server errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOnServerError;

impl RetryPredicate for RetryOnServerError {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        matches!(error, Error::Server { .. })
    }
}

/// Retry only when no response was received (refused connection, timeout).
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOnConnectionError;

impl RetryPredicate for RetryOnConnectionError {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error
            .unexpected_reason()
            .is_some_and(|reason| reason.is_connection_failure())
    }
}

/// Retry only on the listed status codes.
#[derive(Debug, Clone, Default)]
pub struct RetryOnStatus(pub Vec<u16>);

impl RetryPredicate for RetryOnStatus {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.status().is_some_and(|status| self.0.contains(&status))
    }
}

/// Combine multiple retry predicates with OR logic.
///
/// Retries if ANY of the predicates return `true`.
///
/// # Examples
///
/// ```
/// use pipeclient::retry::{OrPredicate, RetryOnConnectionError, RetryOnStatus};
///
/// // Retry on refused connections OR rate limiting
/// let predicate = OrPredicate::new(vec![
///     Box::new(RetryOnConnectionError),
///     Box::new(RetryOnStatus(vec![429])),
/// ]);
/// ```
pub struct OrPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl OrPredicate {
    /// Creates a new `OrPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for OrPredicate {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .any(|p| p.should_retry(error, attempt))
    }
}

/// Combine multiple retry predicates with AND logic.
///
/// Retries only if ALL of the predicates return `true`.
pub struct AndPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl AndPredicate {
    /// Creates a new `AndPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for AndPredicate {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .all(|p| p.should_retry(error, attempt))
    }
}
