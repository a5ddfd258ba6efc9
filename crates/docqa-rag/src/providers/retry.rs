//! Bounded exponential backoff for idempotent remote calls

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// A failed attempt, classified by whether repeating it can help
#[derive(Debug)]
pub enum AttemptError {
    /// Connection failure, timeout, rate limit or server error
    Transient(Error),
    /// Rejected request, bad credentials, malformed response
    Permanent(Error),
}

impl AttemptError {
    /// Classify by HTTP status: 429 and 5xx are transient
    pub fn from_status(status: StatusCode, error: Error) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::Transient(error)
        } else {
            Self::Permanent(error)
        }
    }

    /// Classify a request that got no response: connect errors and timeouts are transient
    pub fn from_request(cause: &reqwest::Error, error: Error) -> Self {
        if cause.is_connect() || cause.is_timeout() {
            Self::Transient(error)
        } else {
            Self::Permanent(error)
        }
    }

    pub fn into_error(self) -> Error {
        match self {
            Self::Transient(e) | Self::Permanent(e) => e,
        }
    }
}

/// Retry schedule: attempt `n` (0-based) waits `base_delay * 2^n` before retrying
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Run `operation` until it succeeds, fails permanently, or the retries
    /// are spent; the last error is returned
    pub async fn run<F, Fut, T>(&self, label: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, AttemptError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(AttemptError::Transient(e)) if attempt < self.max_retries => {
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label,
                        attempt + 1,
                        self.max_retries + 1,
                        delay,
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into_error()),
            }
        }
    }
}
