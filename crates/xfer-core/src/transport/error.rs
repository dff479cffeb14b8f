use std::io;

use crate::registry::TaskAborted;
use crate::retry::{classify_http_status, classify_io_error, ErrorKind};

/// Failure reported by a transport, already classified for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Failure from an HTTP response status.
    pub fn http(code: u16, message: impl Into<String>) -> Self {
        Self::new(classify_http_status(code), message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    /// IO failure with context, e.g. `TransportError::io("read /a", &err)`.
    pub fn io(context: &str, err: &io::Error) -> Self {
        Self::new(classify_io_error(err), format!("{context}: {err}"))
    }
}

impl From<TaskAborted> for TransportError {
    fn from(e: TaskAborted) -> Self {
        Self::new(ErrorKind::Other, e.to_string())
    }
}
