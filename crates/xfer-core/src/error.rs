//! Error taxonomy surfaced by the orchestration core.

use crate::record::TransferId;
use crate::retry::ErrorKind;
use crate::status::TransferStatus;

pub type XferResult<T> = Result<T, XferError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XferError {
    /// Recoverable transport failure (timeout, reset, 5xx, throttling).
    #[error("transport error ({kind:?}): {message}")]
    Transport { kind: ErrorKind, message: String },

    /// Credentials or session rejected; the caller must re-authenticate.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Server refused the operation for a reason retrying will not fix.
    #[error("request rejected ({kind:?}): {message}")]
    Rejected { kind: ErrorKind, message: String },

    #[error("transfer {0} not found")]
    NotFound(TransferId),

    #[error("capacity exceeded: {limit} transfers already queued or running")]
    CapacityExceeded { limit: usize },

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition {
        from: TransferStatus,
        to: TransferStatus,
    },

    #[error("transfer cancelled")]
    Cancelled,

    #[error("transfer {0} is not suspended")]
    NotSuspended(TransferId),

    #[error("transfer {0} is not running")]
    NotRunning(TransferId),

    #[error("invalid transfer request: {0}")]
    InvalidRequest(String),

    #[error("metadata store: {0}")]
    Store(String),

    #[error("scheduler is not running")]
    SchedulerStopped,
}

impl XferError {
    /// Whether the scheduler may retry the transfer that produced this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, XferError::Transport { .. })
    }
}
