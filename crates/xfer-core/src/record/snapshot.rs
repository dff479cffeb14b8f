//! Read-only views handed to callers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Direction, NetworkClass, TransferId};
use crate::status::TransferStatus;

/// Point-in-time copy of a transfer record, safe to hold outside the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferSnapshot {
    pub id: TransferId,
    pub account: String,
    /// `scheme:host:port` of the server.
    pub host: String,
    pub direction: Direction,
    pub network: NetworkClass,
    pub remote_path: String,
    pub local_path: PathBuf,
    pub status: TransferStatus,
    pub retry_count: u32,
    pub forced: bool,
    pub bytes_done: u64,
    pub expected_size: u64,
}

impl TransferSnapshot {
    /// Fraction complete in [0.0, 1.0]. Unknown size reports 0 until done.
    pub fn fraction(&self) -> f64 {
        if self.status == TransferStatus::Done {
            return 1.0;
        }
        if self.expected_size == 0 {
            return 0.0;
        }
        (self.bytes_done as f64 / self.expected_size as f64).min(1.0)
    }

    /// Failed statuses only show up in snapshots once retries are exhausted.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TransferStatus::Done | TransferStatus::Cancelled)
            || self.status.is_failed()
    }
}

/// Metadata the server reports for a finished transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub size: u64,
    pub etag: Option<String>,
    /// Server-side file identifier.
    pub file_id: Option<String>,
    /// Last-modified time as unix seconds.
    pub modified: Option<i64>,
}
