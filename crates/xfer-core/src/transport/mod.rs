//! The transport seam: whatever actually moves bytes to or from the server.
//!
//! The scheduler spawns one [`Transport::transfer`] call per dispatched
//! record and keeps the matching [`TaskHandle`](crate::registry::TaskHandle).
//! Progress flows back through [`ProgressReporter`], the outcome through the
//! returned `Result`.

mod error;
mod local;
mod progress;

pub use error::TransportError;
pub use local::DirectoryTransport;
pub use progress::ProgressReporter;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::record::{Direction, TransferId, TransferRecord, TransferResult};
use crate::registry::TaskSignals;

/// Everything a transport needs to run one attempt of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub id: TransferId,
    pub account: String,
    pub server_url: String,
    pub direction: Direction,
    pub remote_path: String,
    pub local_path: PathBuf,
    pub expected_size: u64,
    /// 1 for the first attempt; increases on every retry.
    pub attempt: u32,
}

impl TransferJob {
    pub(crate) fn for_record(record: &TransferRecord) -> Self {
        Self {
            id: record.id.clone(),
            account: record.account.clone(),
            server_url: record.server_url.clone(),
            direction: record.direction,
            remote_path: record.remote_path.clone(),
            local_path: record.local_path.clone(),
            expected_size: record.expected_size,
            attempt: record.retry_count + 1,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Run one attempt. Implementations should call `signals.checkpoint()`
    /// between chunks so suspend and cancel take effect.
    async fn transfer(
        &self,
        job: TransferJob,
        progress: ProgressReporter,
        signals: TaskSignals,
    ) -> Result<TransferResult, TransportError>;
}
