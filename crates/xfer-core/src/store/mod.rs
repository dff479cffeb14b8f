//! Metadata store: where transfer status survives the process.
//!
//! The scheduler writes through this trait on every status change. Failures
//! are logged by the caller and never fail a transfer.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::record::{TransferId, TransferRecord};
use crate::status::TransferStatus;

#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    async fn read_status(&self, id: &TransferId) -> Result<Option<TransferStatus>>;

    async fn write_status(&self, id: &TransferId, status: TransferStatus) -> Result<()>;

    /// Insert or replace the whole record.
    async fn save(&self, record: &TransferRecord) -> Result<()>;

    async fn remove(&self, id: &TransferId) -> Result<()>;

    /// Every stored record, oldest first.
    async fn list(&self) -> Result<Vec<TransferRecord>>;

    /// Records that still have work to do, reset to their queued state.
    /// Anything persisted mid-transfer (preparing, transferring, suspended)
    /// is treated as queued again.
    async fn load_pending(&self) -> Result<Vec<TransferRecord>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter_map(pending)
            .collect())
    }
}

/// Keep `record` if its persisted status still needs a transfer, with the
/// tracker rewound to the queue.
fn pending(mut record: TransferRecord) -> Option<TransferRecord> {
    let status = record.status();
    let needs_work =
        status.is_queued() || status.is_active() || status == TransferStatus::Suspended;
    if !needs_work {
        return None;
    }
    record.restore_tracker(crate::status::StatusTracker::recovered(
        status,
        record.direction,
    ));
    Some(record)
}
