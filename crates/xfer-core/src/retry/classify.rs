//! Classify HTTP status and IO errors into retry policy error kinds.

use std::io;

use super::policy::ErrorKind;
use crate::error::XferError;
use crate::transport::TransportError;

/// Classify an HTTP status code.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        401 | 403 => ErrorKind::Auth,
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code),
        _ => ErrorKind::Other,
    }
}

/// Classify a socket/file IO error.
pub fn classify_io_error(e: &io::Error) -> ErrorKind {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::Timeout,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::Interrupted => ErrorKind::Connection,
        io::ErrorKind::PermissionDenied => ErrorKind::Auth,
        _ => ErrorKind::Other,
    }
}

/// Map a transport failure onto the caller-facing taxonomy.
pub fn classify(e: &TransportError) -> XferError {
    match e.kind {
        ErrorKind::Auth => XferError::Auth(e.message.clone()),
        kind if kind.is_recoverable() => XferError::Transport {
            kind,
            message: e.message.clone(),
        },
        kind => XferError::Rejected {
            kind,
            message: e.message.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_and_503_throttled() {
        assert_eq!(classify_http_status(429), ErrorKind::Throttled);
        assert_eq!(classify_http_status(503), ErrorKind::Throttled);
    }

    #[test]
    fn http_5xx_retryable() {
        assert_eq!(classify_http_status(500), ErrorKind::Http5xx(500));
        assert_eq!(classify_http_status(502), ErrorKind::Http5xx(502));
    }

    #[test]
    fn http_auth_and_other_4xx() {
        assert_eq!(classify_http_status(401), ErrorKind::Auth);
        assert_eq!(classify_http_status(403), ErrorKind::Auth);
        assert_eq!(classify_http_status(404), ErrorKind::Other);
        assert_eq!(classify_http_status(409), ErrorKind::Other);
    }

    #[test]
    fn io_errors() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(classify_io_error(&reset), ErrorKind::Connection);
        let timeout = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(classify_io_error(&timeout), ErrorKind::Timeout);
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(classify_io_error(&missing), ErrorKind::Other);
    }

    #[test]
    fn transport_errors_map_to_taxonomy() {
        assert!(matches!(
            classify(&TransportError::http(500, "boom")),
            XferError::Transport { kind: ErrorKind::Http5xx(500), .. }
        ));
        assert!(matches!(
            classify(&TransportError::http(401, "who are you")),
            XferError::Auth(m) if m == "who are you"
        ));
        assert!(matches!(
            classify(&TransportError::http(404, "no such file")),
            XferError::Rejected { kind: ErrorKind::Other, .. }
        ));
    }
}
