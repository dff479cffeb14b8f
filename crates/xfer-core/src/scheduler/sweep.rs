//! Timers: the periodic stalled-transfer sweep and retry wake-ups.

use std::time::Duration;

use tokio::time::Instant;

use super::actor::Actor;
use super::event::TaskEvent;
use crate::error::XferError;
use crate::retry::ErrorKind;

impl Actor {
    /// Treat running transfers without progress for `stalled_timeout` as
    /// timed out: stop the transport and fail the attempt.
    pub(super) async fn sweep(&mut self) {
        let timeout = self.config.stalled_timeout();
        let stalled = self.registry.stalled(Instant::now(), timeout);
        for (id, attempt) in stalled {
            if self.registry.current_mut(&id, attempt).is_none() {
                continue;
            }
            let Some(record) = self.registry.unregister(&id) else {
                continue;
            };
            tracing::warn!(id = %id, attempt, "no progress for {}s", timeout.as_secs());
            let error = XferError::Transport {
                kind: ErrorKind::Timeout,
                message: format!("no progress for {}s", timeout.as_secs()),
            };
            self.fail(record, error).await;
        }
    }

    /// Wake the scheduler once a retry delay has passed.
    pub(super) fn schedule_wake(&self, delay: Duration) {
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TaskEvent::BackoffElapsed);
        });
    }
}
