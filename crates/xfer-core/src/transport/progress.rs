use tokio::sync::mpsc;

use crate::record::TransferId;
use crate::scheduler::TaskEvent;

/// Sends byte counts for one attempt back to the scheduler.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<TaskEvent>>,
    id: TransferId,
    attempt: u64,
}

impl ProgressReporter {
    pub(crate) fn new(tx: mpsc::UnboundedSender<TaskEvent>, id: TransferId, attempt: u64) -> Self {
        Self {
            tx: Some(tx),
            id,
            attempt,
        }
    }

    /// A reporter connected to nothing, for driving a transport directly.
    pub fn detached(id: TransferId) -> Self {
        Self {
            tx: None,
            id,
            attempt: 0,
        }
    }

    pub fn id(&self) -> &TransferId {
        &self.id
    }

    /// Total bytes transferred so far in this attempt.
    pub fn report(&self, bytes_done: u64) {
        if let Some(tx) = &self.tx {
            // The scheduler may already have dropped this attempt.
            let _ = tx.send(TaskEvent::Progress {
                id: self.id.clone(),
                attempt: self.attempt,
                bytes_done,
            });
        }
    }
}
