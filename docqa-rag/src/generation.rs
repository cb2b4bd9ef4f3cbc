//! Generation capability trait and the retry policy applied to remote calls.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{GenerationFailure, Result};

/// A capability that turns a prompt into text.
///
/// Failures are reported as [`RagError::Generation`](crate::RagError::Generation)
/// with a [`GenerationFailure`] kind so callers can tell a bad credential from an
/// unreachable service.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short provider name used in errors and logs.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Largest prompt, in characters, the provider accepts.
    fn max_prompt_chars(&self) -> usize;
}

/// Retry policy for generation requests.
///
/// Only transient failures ([`GenerationFailure::is_transient`]) are retried;
/// credential, quota and rejection errors are returned immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    /// One retry after half a second.
    fn default() -> Self {
        Self { max_retries: 1, backoff: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    /// Create a policy with an explicit retry count and fixed backoff.
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self { max_retries, backoff }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self { max_retries: 0, backoff: Duration::ZERO }
    }

    /// Maximum number of retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `operation`, retrying it while it fails transiently.
    pub async fn execute<F, Fut, T>(&self, provider: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let transient =
                        e.generation_failure().is_some_and(GenerationFailure::is_transient);
                    if !transient || attempt >= self.max_retries {
                        return Err(e);
                    }
                    attempt += 1;
                    warn!(provider, attempt, error = %e, "transient generation failure, retrying");
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::RagError;

    fn failure(kind: GenerationFailure) -> RagError {
        RagError::generation("Test", kind, "boom")
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transport_failure_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<&str> = RetryPolicy::default()
            .execute("Test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(failure(GenerationFailure::Transport))
                } else {
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_single_retry() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = RetryPolicy::default()
            .execute("Test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(failure(GenerationFailure::Unavailable))
            })
            .await;
        assert_eq!(result.unwrap_err().generation_failure(), Some(GenerationFailure::Unavailable));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_auth_failure() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = RetryPolicy::default()
            .execute("Test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(failure(GenerationFailure::Unauthorized))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
