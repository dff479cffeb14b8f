//! Per-host concurrency limiter.
//!
//! Each `LimiterKey` (account, server origin, direction, network class) has a
//! counter bounded by `max_per_key`. `try_acquire` never waits; `acquire`
//! parks the caller in a FIFO waiter list (forced callers go to the head)
//! until a `Permit` for the same key is dropped.

mod key;
mod permit;

pub use key::{HostKey, LimiterKey};
pub use permit::Permit;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

type Slots = HashMap<LimiterKey, Slot>;

#[derive(Default)]
struct Slot {
    in_use: usize,
    waiters: VecDeque<Waiter>,
}

struct Waiter {
    id: u64,
    grant: oneshot::Sender<()>,
}

pub(crate) struct Shared {
    max_per_key: usize,
    slots: Mutex<Slots>,
    next_waiter: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slots> {
        // Slot bookkeeping stays consistent even if a holder panicked.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Hand the slot to the first live waiter, or give it back to the counter.
fn release_slot(slots: &mut Slots, key: &LimiterKey) {
    let Some(slot) = slots.get_mut(key) else {
        return;
    };
    while let Some(waiter) = slot.waiters.pop_front() {
        if waiter.grant.send(()).is_ok() {
            return;
        }
    }
    slot.in_use = slot.in_use.saturating_sub(1);
    if slot.in_use == 0 {
        slots.remove(key);
    }
}

/// Shared handle to the limiter; clones refer to the same counters.
#[derive(Clone)]
pub struct HostLimiter {
    shared: Arc<Shared>,
}

impl HostLimiter {
    /// Zero is treated as one; `XferConfig::validate` rejects it before the
    /// scheduler gets this far.
    pub fn new(max_per_key: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                max_per_key: max_per_key.max(1),
                slots: Mutex::new(HashMap::new()),
                next_waiter: AtomicU64::new(0),
            }),
        }
    }

    pub fn max_per_key(&self) -> usize {
        self.shared.max_per_key
    }

    /// Take a slot if one is free and nobody is queued for this key.
    pub fn try_acquire(&self, key: &LimiterKey) -> Option<Permit> {
        let mut slots = self.shared.lock();
        let slot = slots.entry(key.clone()).or_default();
        if slot.waiters.is_empty() && slot.in_use < self.shared.max_per_key {
            slot.in_use += 1;
            return Some(self.permit(key.clone()));
        }
        None
    }

    /// Wait for a slot. Waiters are served FIFO per key; `forced` waiters
    /// are served before every non-forced one already waiting.
    pub async fn acquire(&self, key: LimiterKey, forced: bool) -> Permit {
        let (id, rx) = {
            let mut slots = self.shared.lock();
            let slot = slots.entry(key.clone()).or_default();
            if slot.waiters.is_empty() && slot.in_use < self.shared.max_per_key {
                slot.in_use += 1;
                return self.permit(key);
            }
            let id = self.shared.next_waiter.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            let waiter = Waiter { id, grant: tx };
            if forced {
                slot.waiters.push_front(waiter);
            } else {
                slot.waiters.push_back(waiter);
            }
            (id, rx)
        };

        let mut pending = PendingAcquire {
            shared: Arc::clone(&self.shared),
            key,
            id,
            rx,
            granted: false,
        };
        // The sender is only consumed by `release_slot`, which sends first.
        let _ = (&mut pending.rx).await;
        pending.granted = true;
        self.permit(pending.key.clone())
    }

    /// Give a permit back. Equivalent to dropping it.
    pub fn release(&self, permit: Permit) {
        drop(permit);
    }

    /// Slots currently held for `key`.
    pub fn in_use(&self, key: &LimiterKey) -> usize {
        self.shared.lock().get(key).map(|s| s.in_use).unwrap_or(0)
    }

    /// Callers parked in `acquire` for `key`.
    pub fn waiting(&self, key: &LimiterKey) -> usize {
        self.shared
            .lock()
            .get(key)
            .map(|s| s.waiters.len())
            .unwrap_or(0)
    }

    fn permit(&self, key: LimiterKey) -> Permit {
        Permit {
            shared: Arc::clone(&self.shared),
            key,
        }
    }
}

/// Parked `acquire` call. If the caller gives up, it leaves the waiter list;
/// if a slot was already handed to it, the slot is passed on.
struct PendingAcquire {
    shared: Arc<Shared>,
    key: LimiterKey,
    id: u64,
    rx: oneshot::Receiver<()>,
    granted: bool,
}

impl Drop for PendingAcquire {
    fn drop(&mut self) {
        if self.granted {
            return;
        }
        let mut slots = self.shared.lock();
        if let Some(slot) = slots.get_mut(&self.key) {
            if let Some(pos) = slot.waiters.iter().position(|w| w.id == self.id) {
                slot.waiters.remove(pos);
                return;
            }
        }
        if self.rx.try_recv().is_ok() {
            release_slot(&mut slots, &self.key);
        }
    }
}
