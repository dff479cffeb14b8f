//! Moving queued records onto the transport while host slots are free.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::actor::Actor;
use super::event::TaskEvent;
use crate::limiter::Permit;
use crate::record::TransferRecord;
use crate::registry::task_channel;
use crate::retry::ErrorKind;
use crate::status::TransferStatus;
use crate::transport::{ProgressReporter, TransferJob, TransportError};

/// How long a cancelled transport may take to return before it is aborted.
const CANCEL_GRACE: Duration = Duration::from_secs(2);

impl Actor {
    /// Start every queued record that has a free slot and no pending
    /// backoff. Records that cannot start keep their queue position.
    pub(super) async fn dispatch(&mut self) {
        let now = Instant::now();
        let mut ready: Vec<(TransferRecord, Permit)> = Vec::new();
        for (account, direction) in self.queues.keys() {
            let Some(queue) = self.queues.queue_mut(&account, direction) else {
                continue;
            };
            loop {
                let limiter = &self.limiter;
                let mut granted = None;
                let next = queue.dequeue_first(|rec| {
                    if rec.ready_at.is_some_and(|at| at > now) {
                        return false;
                    }
                    granted = limiter.try_acquire(&rec.limiter_key());
                    granted.is_some()
                });
                match (next, granted) {
                    (Some(record), Some(permit)) => ready.push((record, permit)),
                    _ => break,
                }
            }
        }
        self.queues.prune();

        for (record, permit) in ready {
            self.start(record, permit).await;
        }
    }

    async fn start(&mut self, mut record: TransferRecord, permit: Permit) {
        let preparing = TransferStatus::preparing(record.direction);
        if let Err(e) = record.set_status(preparing) {
            drop(permit);
            self.abandon(record, e).await;
            return;
        }
        record.ready_at = None;

        self.attempts += 1;
        let attempt = self.attempts;
        let id = record.id.clone();
        let job = TransferJob::for_record(&record);
        let (handle, signals) = task_channel();
        let progress = ProgressReporter::new(self.task_tx.clone(), id.clone(), attempt);

        tracing::debug!(
            id = %id,
            attempt,
            retry = record.retry_count,
            slot = %permit.key(),
            "dispatching transfer"
        );
        self.persist_status(&record).await;
        self.registry
            .register(record, attempt, handle, permit, Instant::now());

        let transport = Arc::clone(&self.transport);
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let mut cancelled = signals.clone();
            let mut run =
                tokio::spawn(async move { transport.transfer(job, progress, signals).await });
            let outcome = tokio::select! {
                joined = &mut run => match joined {
                    Ok(outcome) => outcome,
                    Err(e) => Err(TransportError::new(
                        ErrorKind::Other,
                        format!("transport task failed: {e}"),
                    )),
                },
                _ = cancelled.cancelled() => {
                    // Give the transport a chance to clean up after itself.
                    if tokio::time::timeout(CANCEL_GRACE, &mut run).await.is_err() {
                        run.abort();
                    }
                    Err(TransportError::new(ErrorKind::Other, "transfer aborted"))
                }
            };
            let _ = tx.send(TaskEvent::Finished {
                id,
                attempt,
                outcome,
            });
        });
    }
}
