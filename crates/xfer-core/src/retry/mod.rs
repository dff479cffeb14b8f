//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, throttling,
//! connection failures, auth) and the backoff decision so the scheduler
//! and transports share one consistent policy.

mod classify;
mod policy;

pub use classify::{classify, classify_http_status, classify_io_error};
pub use policy::{BackoffStrategy, ErrorKind, RetryDecision, RetryPolicy};
