use std::collections::VecDeque;

use crate::record::{TransferId, TransferRecord};

/// Terminal records kept for status queries, oldest evicted first.
#[derive(Debug)]
pub(crate) struct FinishedTable {
    records: VecDeque<TransferRecord>,
    max: usize,
}

impl FinishedTable {
    pub(crate) fn new(max: usize) -> Self {
        Self {
            records: VecDeque::new(),
            max,
        }
    }

    pub(crate) fn push(&mut self, record: TransferRecord) {
        self.remove(&record.id);
        if self.max == 0 {
            return;
        }
        while self.records.len() >= self.max {
            if let Some(evicted) = self.records.pop_front() {
                tracing::debug!(id = %evicted.id, "evicted finished transfer");
            }
        }
        self.records.push_back(record);
    }

    pub(crate) fn get(&self, id: &TransferId) -> Option<&TransferRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub(crate) fn remove(&mut self, id: &TransferId) -> Option<TransferRecord> {
        let pos = self.records.iter().position(|r| &r.id == id)?;
        self.records.remove(pos)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &TransferRecord> {
        self.records.iter()
    }
}
