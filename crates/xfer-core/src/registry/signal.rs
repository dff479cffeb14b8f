//! Pause/cancel signalling between the scheduler and a running transport task.
//!
//! The scheduler keeps a `TaskHandle`; the transport gets `TaskSignals` and
//! calls `checkpoint()` between chunks. Dropping the handle counts as cancel.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSignal {
    Run,
    Pause,
    Cancel,
}

/// Error returned to a transport whose task was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskAborted;

impl std::fmt::Display for TaskAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transfer aborted")
    }
}

impl std::error::Error for TaskAborted {}

/// Create a connected handle/signals pair in the `Run` state.
pub fn task_channel() -> (TaskHandle, TaskSignals) {
    let (tx, rx) = watch::channel(TaskSignal::Run);
    (TaskHandle { tx }, TaskSignals { rx })
}

/// Scheduler side: the cancellation handle of a running task.
#[derive(Debug)]
pub struct TaskHandle {
    tx: watch::Sender<TaskSignal>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(TaskSignal::Cancel);
    }

    pub fn pause(&self) {
        self.tx.send_if_modified(|s| {
            if *s == TaskSignal::Run {
                *s = TaskSignal::Pause;
                true
            } else {
                false
            }
        });
    }

    pub fn resume(&self) {
        self.tx.send_if_modified(|s| {
            if *s == TaskSignal::Pause {
                *s = TaskSignal::Run;
                true
            } else {
                false
            }
        });
    }

    pub fn current(&self) -> TaskSignal {
        *self.tx.borrow()
    }
}

/// Transport side: observe pause/cancel requests.
#[derive(Debug, Clone)]
pub struct TaskSignals {
    rx: watch::Receiver<TaskSignal>,
}

impl TaskSignals {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() == TaskSignal::Cancel || self.rx.has_changed().is_err()
    }

    pub fn is_paused(&self) -> bool {
        *self.rx.borrow() == TaskSignal::Pause
    }

    /// Returns immediately while running, waits while paused, and fails once
    /// the task is cancelled (or its handle is gone).
    pub async fn checkpoint(&mut self) -> Result<(), TaskAborted> {
        loop {
            let signal = *self.rx.borrow_and_update();
            match signal {
                TaskSignal::Run => return Ok(()),
                TaskSignal::Cancel => return Err(TaskAborted),
                TaskSignal::Pause => {
                    if self.rx.changed().await.is_err() {
                        return Err(TaskAborted);
                    }
                }
            }
        }
    }

    /// Resolves once the task is cancelled. For use in `select!`.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() == TaskSignal::Cancel {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn checkpoint_passes_while_running() {
        let (_handle, mut signals) = task_channel();
        assert!(signals.checkpoint().await.is_ok());
        assert!(!signals.is_cancelled());
    }

    #[tokio::test]
    async fn checkpoint_blocks_while_paused_until_resume() {
        let (handle, mut signals) = task_channel();
        handle.pause();
        assert!(signals.is_paused());
        let blocked =
            tokio::time::timeout(Duration::from_millis(20), signals.checkpoint()).await;
        assert!(blocked.is_err(), "checkpoint must wait while paused");

        handle.resume();
        assert!(signals.checkpoint().await.is_ok());
    }

    #[tokio::test]
    async fn cancel_wins_over_pause() {
        let (handle, mut signals) = task_channel();
        handle.pause();
        handle.cancel();
        handle.resume();
        assert_eq!(handle.current(), TaskSignal::Cancel);
        assert_eq!(signals.checkpoint().await, Err(TaskAborted));
    }

    #[tokio::test]
    async fn dropping_the_handle_aborts() {
        let (handle, mut signals) = task_channel();
        handle.pause();
        drop(handle);
        assert_eq!(signals.checkpoint().await, Err(TaskAborted));
        assert!(signals.is_cancelled());
        signals.cancelled().await;
    }
}
