//! Progress and outcomes reported by transport tasks.

use tokio::time::Instant;

use super::actor::Actor;
use super::event::{TaskEvent, TransferEvent};
use crate::error::XferError;
use crate::record::{TransferId, TransferRecord, TransferResult};
use crate::retry::{classify, RetryDecision};
use crate::status::TransferStatus;
use crate::transport::TransportError;

impl Actor {
    pub(super) async fn handle_task_event(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Progress {
                id,
                attempt,
                bytes_done,
            } => self.on_progress(&id, attempt, bytes_done).await,
            TaskEvent::Finished {
                id,
                attempt,
                outcome,
            } => self.on_finished(&id, attempt, outcome).await,
            TaskEvent::BackoffElapsed => {}
        }
    }

    async fn on_progress(&mut self, id: &TransferId, attempt: u64, bytes_done: u64) {
        let Some(entry) = self.registry.current_mut(id, attempt) else {
            return;
        };
        entry.last_progress_at = Instant::now();
        entry.record.bytes_done = bytes_done;

        let status = entry.record.status();
        if status != TransferStatus::preparing(entry.record.direction) {
            return;
        }
        let next = TransferStatus::transferring(entry.record.direction);
        match entry.record.set_status(next) {
            Ok(()) => {
                let record = entry.record.clone();
                self.persist_status(&record).await;
            }
            Err(e) => {
                if let Some(record) = self.registry.unregister(id) {
                    self.abandon(record, e).await;
                }
            }
        }
    }

    async fn on_finished(
        &mut self,
        id: &TransferId,
        attempt: u64,
        outcome: Result<TransferResult, TransportError>,
    ) {
        if self.registry.current_mut(id, attempt).is_none() {
            tracing::trace!(id = %id, attempt, "ignoring outcome of a stale attempt");
            return;
        }
        let Some(record) = self.registry.unregister(id) else {
            return;
        };
        match outcome {
            Ok(result) => self.complete(record, result).await,
            Err(err) => {
                let error = classify(&err);
                self.fail(record, error).await;
            }
        }
    }

    async fn complete(&mut self, mut record: TransferRecord, result: TransferResult) {
        let moved = settle(&mut record).and_then(|()| {
            let transferring = TransferStatus::transferring(record.direction);
            if record.status() != transferring {
                record.set_status(transferring)?;
            }
            record.set_status(TransferStatus::Done)
        });
        if let Err(e) = moved {
            self.abandon(record, e).await;
            return;
        }
        record.bytes_done = result.size;
        tracing::info!(id = %record.id, size = result.size, "transfer done");
        self.persist(&record).await;
        self.emit(TransferEvent::Completed {
            account: record.account.clone(),
            id: record.id.clone(),
            direction: record.direction,
            result,
        });
        self.finished.push(record);
    }

    /// Record a failed attempt: requeue it with backoff while the retry
    /// budget lasts, otherwise end the transfer.
    pub(super) async fn fail(&mut self, mut record: TransferRecord, error: XferError) {
        let failed = TransferStatus::failed(record.direction);
        if let Err(e) = settle(&mut record).and_then(|()| record.set_status(failed)) {
            self.abandon(record, e).await;
            return;
        }

        if let XferError::Transport { kind, .. } = &error {
            if let RetryDecision::RetryAfter(delay) = self.policy.decide(record.retry_count, *kind)
            {
                if let Err(e) = record.set_status(TransferStatus::queued(record.direction)) {
                    self.abandon(record, e).await;
                    return;
                }
                record.retry_count += 1;
                record.forced = false;
                record.bytes_done = 0;
                record.ready_at = Some(Instant::now() + delay);
                tracing::warn!(
                    id = %record.id,
                    retry = record.retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "transfer failed, retrying: {error}"
                );
                self.persist(&record).await;
                self.schedule_wake(delay);
                self.queues.enqueue(record);
                return;
            }
        }

        if let Err(e) = record.tracker.finish() {
            tracing::error!(id = %record.id, "{e}");
        }
        tracing::warn!(id = %record.id, retries = record.retry_count, "transfer failed: {error}");
        self.persist(&record).await;
        self.emit_failure(&record, error);
        self.finished.push(record);
    }

    /// End a transfer whose status could not move as required. Always
    /// terminal, always notified.
    pub(super) async fn abandon(&mut self, mut record: TransferRecord, error: XferError) {
        tracing::error!(id = %record.id, status = %record.status(), "abandoning transfer: {error}");
        let failed = TransferStatus::failed(record.direction);
        if !record.is_terminal() {
            let _ = settle(&mut record);
            if record.status() != failed {
                let _ = record.set_status(failed);
            }
            let _ = record.tracker.finish();
        }
        self.persist(&record).await;
        self.emit_failure(&record, error);
        self.finished.push(record);
    }
}

/// A transport may finish while suspended; put the record back in the state
/// it was suspended from before moving it on.
fn settle(record: &mut TransferRecord) -> Result<(), XferError> {
    if record.status() != TransferStatus::Suspended {
        return Ok(());
    }
    match record.tracker.suspended_from() {
        Some(prev) => record.set_status(prev),
        None => Err(XferError::InvalidTransition {
            from: TransferStatus::Suspended,
            to: TransferStatus::failed(record.direction),
        }),
    }
}
