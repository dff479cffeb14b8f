//! Operation queues: pending transfers per (account, direction), waiting
//! for a limiter slot.
//!
//! Ordering is FIFO except that forced records are promoted ahead of every
//! non-forced record (and stay FIFO among themselves).

use std::collections::{HashMap, VecDeque};

use crate::record::{Direction, TransferId, TransferRecord, TransferSnapshot};

#[derive(Debug, Default)]
pub struct OperationQueue {
    records: VecDeque<TransferRecord>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn enqueue(&mut self, record: TransferRecord) {
        if record.forced {
            let pos = self
                .records
                .iter()
                .position(|r| !r.forced)
                .unwrap_or(self.records.len());
            self.records.insert(pos, record);
        } else {
            self.records.push_back(record);
        }
    }

    pub fn dequeue_next(&mut self) -> Option<TransferRecord> {
        self.records.pop_front()
    }

    /// Remove the first record (in queue order) that satisfies `pred`.
    pub fn dequeue_first<F>(&mut self, mut pred: F) -> Option<TransferRecord>
    where
        F: FnMut(&TransferRecord) -> bool,
    {
        let pos = self.records.iter().position(|r| pred(r))?;
        self.records.remove(pos)
    }

    /// Take a record out before it starts (cancel).
    pub fn remove(&mut self, id: &TransferId) -> Option<TransferRecord> {
        let pos = self.records.iter().position(|r| &r.id == id)?;
        self.records.remove(pos)
    }

    pub fn get(&self, id: &TransferId) -> Option<&TransferRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn peek_all(&self) -> Vec<TransferSnapshot> {
        self.records.iter().map(TransferRecord::snapshot).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransferRecord> {
        self.records.iter()
    }
}

/// Every operation queue, keyed by (account, direction).
#[derive(Debug, Default)]
pub struct QueueSet {
    queues: HashMap<(String, Direction), OperationQueue>,
}

impl QueueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, record: TransferRecord) {
        self.queues.entry(record.queue_key()).or_default().enqueue(record);
    }

    pub fn queue_mut(&mut self, account: &str, direction: Direction) -> Option<&mut OperationQueue> {
        self.queues.get_mut(&(account.to_string(), direction))
    }

    /// Keys of non-empty queues, sorted so dispatch order is deterministic.
    pub fn keys(&self) -> Vec<(String, Direction)> {
        let mut keys: Vec<_> = self
            .queues
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| a.1.as_str().cmp(b.1.as_str()))
        });
        keys
    }

    pub fn remove(&mut self, id: &TransferId) -> Option<TransferRecord> {
        self.queues.values_mut().find_map(|q| q.remove(id))
    }

    pub fn get(&self, id: &TransferId) -> Option<&TransferRecord> {
        self.queues.values().find_map(|q| q.get(id))
    }

    pub fn contains(&self, id: &TransferId) -> bool {
        self.get(id).is_some()
    }

    pub fn total_len(&self) -> usize {
        self.queues.values().map(OperationQueue::len).sum()
    }

    pub fn peek_all(&self) -> Vec<TransferSnapshot> {
        let mut out = Vec::with_capacity(self.total_len());
        for key in self.keys() {
            if let Some(q) = self.queues.get(&key) {
                out.extend(q.peek_all());
            }
        }
        out
    }

    /// Drop empty queues so the key map does not grow with every account seen.
    pub fn prune(&mut self) {
        self.queues.retain(|_, q| !q.is_empty());
    }
}
