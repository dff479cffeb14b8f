//! Messages out of the scheduler (caller notifications) and into it (from
//! transport tasks and timers).

use tokio::sync::mpsc;

use crate::error::XferError;
use crate::record::{Direction, TransferId, TransferResult};
use crate::transport::TransportError;

/// Terminal notification for one transfer. Exactly one is emitted per
/// transfer, except for transfers interrupted by `shutdown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Completed {
        account: String,
        id: TransferId,
        direction: Direction,
        result: TransferResult,
    },
    Failed {
        account: String,
        id: TransferId,
        direction: Direction,
        error: XferError,
    },
}

impl TransferEvent {
    pub fn id(&self) -> &TransferId {
        match self {
            TransferEvent::Completed { id, .. } | TransferEvent::Failed { id, .. } => id,
        }
    }

    pub fn account(&self) -> &str {
        match self {
            TransferEvent::Completed { account, .. } | TransferEvent::Failed { account, .. } => {
                account
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransferEvent::Completed { .. })
    }
}

/// Receiving end of the notification stream.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<TransferEvent>,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<TransferEvent>) -> Self {
        Self { rx }
    }

    /// Next notification; `None` once the scheduler has stopped and every
    /// buffered event was read.
    pub async fn recv(&mut self) -> Option<TransferEvent> {
        self.rx.recv().await
    }

    /// Next notification if one is already buffered.
    pub fn try_recv(&mut self) -> Option<TransferEvent> {
        self.rx.try_recv().ok()
    }
}

/// Input from transport tasks and timers, tagged with the dispatch attempt
/// it belongs to.
#[derive(Debug)]
pub(crate) enum TaskEvent {
    Progress {
        id: TransferId,
        attempt: u64,
        bytes_done: u64,
    },
    Finished {
        id: TransferId,
        attempt: u64,
        outcome: Result<TransferResult, TransportError>,
    },
    /// A retry delay ran out; queued records may be dispatchable now.
    BackoffElapsed,
}
