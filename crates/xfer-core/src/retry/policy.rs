use std::time::Duration;

use serde::{Deserialize, Serialize};

/// High-level classification of a transport failure for retry purposes.
///
/// Transports map HTTP status codes, socket errors or IO failures into
/// these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read), or the task stalled.
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Server error that is worth retrying.
    Http5xx(u16),
    /// Credentials or session rejected (401, 403).
    Auth,
    /// Anything else; not retried.
    Other,
}

impl ErrorKind {
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::Throttled | ErrorKind::Connection | ErrorKind::Http5xx(_)
        )
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Requeue and retry after the given delay.
    RetryAfter(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// base * 2^(n-1), capped at `max_delay`.
    Exponential,
}

/// Retry ceiling and backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    pub strategy: BackoffStrategy,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            strategy: BackoffStrategy::Fixed,
            base_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after a failure, given how many retries were
    /// already spent on this transfer.
    pub fn decide(&self, retries_done: u32, kind: ErrorKind) -> RetryDecision {
        if !kind.is_recoverable() || retries_done >= self.max_retries {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.backoff(retries_done + 1))
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay.min(self.max_delay),
            BackoffStrategy::Exponential => {
                let exp = 1u32 << retry.saturating_sub(1).min(16);
                self.base_delay.saturating_mul(exp).min(self.max_delay)
            }
        }
    }
}
