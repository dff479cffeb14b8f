//! Task registry: running transfers by id, with their cancellation handle
//! and the limiter permit they hold.
//!
//! Removing an entry drops its permit, so a permit is released exactly once
//! however the transfer ends.

mod signal;

pub use signal::{task_channel, TaskAborted, TaskHandle, TaskSignal, TaskSignals};

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{XferError, XferResult};
use crate::limiter::Permit;
use crate::record::{TransferId, TransferRecord, TransferSnapshot};
use crate::status::TransferStatus;

/// A running transfer.
#[derive(Debug)]
pub struct TaskEntry {
    pub record: TransferRecord,
    /// Dispatch generation; events from older attempts are stale.
    pub attempt: u64,
    pub started_at: Instant,
    pub last_progress_at: Instant,
    handle: TaskHandle,
    permit: Permit,
}

impl TaskEntry {
    pub fn is_suspended(&self) -> bool {
        self.record.status() == TransferStatus::Suspended
    }

    pub fn permit(&self) -> &Permit {
        &self.permit
    }
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    entries: HashMap<TransferId, TaskEntry>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &TransferId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn register(
        &mut self,
        record: TransferRecord,
        attempt: u64,
        handle: TaskHandle,
        permit: Permit,
        now: Instant,
    ) {
        let id = record.id.clone();
        let entry = TaskEntry {
            record,
            attempt,
            started_at: now,
            last_progress_at: now,
            handle,
            permit,
        };
        if let Some(old) = self.entries.insert(id.clone(), entry) {
            tracing::error!(id = %id, attempt = old.attempt, "replaced a live registry entry");
            old.handle.cancel();
        }
    }

    pub fn get(&self, id: &TransferId) -> Option<&TaskEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &TransferId) -> Option<&mut TaskEntry> {
        self.entries.get_mut(id)
    }

    /// Entry for `id` if `attempt` is the one currently running.
    pub fn current_mut(&mut self, id: &TransferId, attempt: u64) -> Option<&mut TaskEntry> {
        self.entries.get_mut(id).filter(|e| e.attempt == attempt)
    }

    /// Remove an entry and release its permit. The transport is told to stop
    /// in case it is still running.
    pub fn unregister(&mut self, id: &TransferId) -> Option<TransferRecord> {
        let entry = self.entries.remove(id)?;
        entry.handle.cancel();
        Some(entry.record)
    }

    /// Stop the transport, mark the record cancelled and release its permit.
    pub fn cancel(&mut self, id: &TransferId) -> XferResult<TransferRecord> {
        let entry = self
            .entries
            .remove(id)
            .ok_or_else(|| XferError::NotFound(id.clone()))?;
        entry.handle.cancel();
        let TaskEntry { mut record, .. } = entry;
        record.set_status(TransferStatus::Cancelled)?;
        Ok(record)
    }

    /// Pause the transport without giving up the permit. Suspending twice is a no-op.
    pub fn suspend(&mut self, id: &TransferId) -> XferResult<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| XferError::NotFound(id.clone()))?;
        if entry.is_suspended() {
            return Ok(());
        }
        entry.record.set_status(TransferStatus::Suspended)?;
        entry.handle.pause();
        Ok(())
    }

    /// Continue a suspended transport in the state it was interrupted in.
    pub fn resume(&mut self, id: &TransferId, now: Instant) -> XferResult<TransferStatus> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| XferError::NotFound(id.clone()))?;
        let Some(target) = entry.record.tracker.suspended_from() else {
            return Err(XferError::NotSuspended(id.clone()));
        };
        entry.record.set_status(target)?;
        entry.handle.resume();
        entry.last_progress_at = now;
        Ok(target)
    }

    pub fn lookup(&self, id: &TransferId) -> XferResult<TransferSnapshot> {
        self.entries
            .get(id)
            .map(|e| e.record.snapshot())
            .ok_or_else(|| XferError::NotFound(id.clone()))
    }

    /// Running, non-suspended entries with no progress for longer than `timeout`.
    pub fn stalled(&self, now: Instant, timeout: Duration) -> Vec<(TransferId, u64)> {
        let mut out: Vec<_> = self
            .entries
            .values()
            .filter(|e| !e.is_suspended())
            .filter(|e| now.saturating_duration_since(e.last_progress_at) > timeout)
            .map(|e| (e.record.id.clone(), e.attempt))
            .collect();
        out.sort();
        out
    }

    pub fn snapshots(&self) -> Vec<TransferSnapshot> {
        let mut out: Vec<_> = self.entries.values().map(|e| e.record.snapshot()).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Cancel every running transport and empty the registry (shutdown).
    pub fn drain(&mut self) -> Vec<TransferRecord> {
        self.entries
            .drain()
            .map(|(_, e)| {
                e.handle.cancel();
                e.record
            })
            .collect()
    }
}
