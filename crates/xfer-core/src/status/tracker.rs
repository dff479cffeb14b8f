use crate::error::{XferError, XferResult};
use crate::record::Direction;

use super::TransferStatus;

/// Current status of one transfer plus the bookkeeping needed to validate
/// the next move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTracker {
    current: TransferStatus,
    /// State interrupted by a suspension; the only legal resume target.
    suspended_from: Option<TransferStatus>,
    /// Set once a failed state becomes final (no more retries).
    finished: bool,
}

impl StatusTracker {
    /// Tracker for a newly enqueued transfer.
    pub fn queued(direction: Direction) -> Self {
        Self::starting_at(TransferStatus::queued(direction))
    }

    /// Tracker for a record that is not part of any transfer.
    pub fn idle() -> Self {
        Self::starting_at(TransferStatus::Normal)
    }

    /// Tracker for a record reloaded after a restart. Anything that was in
    /// flight when the process stopped goes back to the queue.
    pub fn recovered(persisted: TransferStatus, direction: Direction) -> Self {
        if persisted.is_idle() {
            Self::starting_at(persisted)
        } else {
            Self::queued(direction)
        }
    }

    /// Tracker exactly as a store last saw it. A stored failed status is final,
    /// since retries never persist the intermediate failed step.
    pub fn persisted(status: TransferStatus) -> Self {
        Self {
            finished: status.is_failed(),
            ..Self::starting_at(status)
        }
    }

    fn starting_at(status: TransferStatus) -> Self {
        Self {
            current: status,
            suspended_from: None,
            finished: false,
        }
    }

    pub fn current(&self) -> TransferStatus {
        self.current
    }

    /// The state a suspended transfer returns to on resume.
    pub fn suspended_from(&self) -> Option<TransferStatus> {
        self.suspended_from
    }

    /// No further automatic transition will happen.
    pub fn is_terminal(&self) -> bool {
        self.finished
            || matches!(self.current, TransferStatus::Done | TransferStatus::Cancelled)
    }

    /// Move to `to`, or fail with `InvalidTransition` leaving the state untouched.
    pub fn transition(&mut self, to: TransferStatus) -> XferResult<()> {
        let from = self.current;
        let allowed = if self.is_terminal() {
            false
        } else if from == TransferStatus::Suspended {
            to == TransferStatus::Cancelled || Some(to) == self.suspended_from
        } else {
            from.can_transition_to(to)
        };
        if !allowed {
            return Err(XferError::InvalidTransition { from, to });
        }

        if to == TransferStatus::Suspended {
            self.suspended_from = Some(from);
        } else if from == TransferStatus::Suspended {
            self.suspended_from = None;
        }
        self.current = to;
        Ok(())
    }

    /// Mark the current failed state as final.
    pub fn finish(&mut self) -> XferResult<()> {
        if !self.current.is_failed() || self.finished {
            return Err(XferError::InvalidTransition {
                from: self.current,
                to: self.current,
            });
        }
        self.finished = true;
        Ok(())
    }
}
