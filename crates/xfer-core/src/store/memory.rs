use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::MetadataStore;
use crate::record::{TransferId, TransferRecord};
use crate::status::TransferStatus;

/// Process-local store. Keeps insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<TransferRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (reads keep working).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TransferRecord>> {
        self.records.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory store is read-only");
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn read_status(&self, id: &TransferId) -> Result<Option<TransferStatus>> {
        Ok(self.lock().iter().find(|r| &r.id == id).map(|r| r.status()))
    }

    async fn write_status(&self, id: &TransferId, status: TransferStatus) -> Result<()> {
        self.check_writable()?;
        if let Some(r) = self.lock().iter_mut().find(|r| &r.id == id) {
            r.restore_tracker(crate::status::StatusTracker::persisted(status));
        }
        Ok(())
    }

    async fn save(&self, record: &TransferRecord) -> Result<()> {
        self.check_writable()?;
        let mut records = self.lock();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn remove(&self, id: &TransferId) -> Result<()> {
        self.check_writable()?;
        self.lock().retain(|r| &r.id != id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TransferRecord>> {
        Ok(self.lock().clone())
    }
}
