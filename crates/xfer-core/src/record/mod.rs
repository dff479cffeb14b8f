//! Transfer records: the unit of work the scheduler moves through its
//! queues, registry and finished table.

mod id;
mod request;
mod snapshot;

pub use id::TransferId;
pub use request::{Direction, NetworkClass, TransferRequest};
pub use snapshot::{TransferResult, TransferSnapshot};

use std::path::PathBuf;

use tokio::time::Instant;

use crate::error::{XferError, XferResult};
use crate::limiter::{HostKey, LimiterKey};
use crate::status::{StatusTracker, TransferStatus};

/// One file transfer, owned by the scheduler once enqueued.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub id: TransferId,
    pub account: String,
    pub server_url: String,
    pub host: HostKey,
    pub network: NetworkClass,
    pub direction: Direction,
    pub remote_path: String,
    pub local_path: PathBuf,
    pub expected_size: u64,
    pub bytes_done: u64,
    pub retry_count: u32,
    pub forced: bool,
    /// Unix seconds at submission.
    pub created_at: i64,
    /// Backoff: not dispatchable before this instant.
    pub ready_at: Option<Instant>,
    pub(crate) tracker: StatusTracker,
}

impl TransferRecord {
    /// Build a queued record from a caller request. Assigns an id if the
    /// request has none.
    pub fn from_request(request: TransferRequest) -> XferResult<Self> {
        if request.account.is_empty() {
            return Err(XferError::InvalidRequest("account must not be empty".into()));
        }
        if request.remote_path.is_empty() {
            return Err(XferError::InvalidRequest("remote path must not be empty".into()));
        }
        let host = HostKey::from_url(&request.server_url)
            .map_err(|e| XferError::InvalidRequest(format!("{e:#}")))?;
        Ok(Self {
            id: request.id.unwrap_or_else(TransferId::generate),
            account: request.account,
            server_url: request.server_url,
            host,
            network: request.network,
            direction: request.direction,
            remote_path: request.remote_path,
            local_path: request.local_path,
            expected_size: request.expected_size,
            bytes_done: 0,
            retry_count: 0,
            forced: request.forced,
            created_at: unix_timestamp(),
            ready_at: None,
            tracker: StatusTracker::queued(request.direction),
        })
    }

    pub fn status(&self) -> TransferStatus {
        self.tracker.current()
    }

    pub fn is_terminal(&self) -> bool {
        self.tracker.is_terminal()
    }

    pub(crate) fn set_status(&mut self, to: TransferStatus) -> XferResult<()> {
        self.tracker.transition(to)
    }

    pub(crate) fn restore_tracker(&mut self, tracker: StatusTracker) {
        self.tracker = tracker;
    }

    /// The limiter slot this record competes for.
    pub fn limiter_key(&self) -> LimiterKey {
        LimiterKey {
            account: self.account.clone(),
            host: self.host.clone(),
            direction: self.direction,
            network: self.network,
        }
    }

    /// Queue partition: transfers are ordered per account and direction.
    pub fn queue_key(&self) -> (String, Direction) {
        (self.account.clone(), self.direction)
    }

    pub fn snapshot(&self) -> TransferSnapshot {
        TransferSnapshot {
            id: self.id.clone(),
            account: self.account.clone(),
            host: self.host.to_string_key(),
            direction: self.direction,
            network: self.network,
            remote_path: self.remote_path.clone(),
            local_path: self.local_path.clone(),
            status: self.status(),
            retry_count: self.retry_count,
            forced: self.forced,
            bytes_done: self.bytes_done,
            expected_size: self.expected_size,
        }
    }
}

pub(crate) fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
