//! RAII permit that returns its slot to the limiter when dropped.

use std::sync::Arc;

use super::{LimiterKey, Shared};

/// One unit of concurrency for a limiter key. Dropping it releases the slot
/// exactly once, handing it to the next waiter if there is one.
pub struct Permit {
    pub(super) shared: Arc<Shared>,
    pub(super) key: LimiterKey,
}

impl Permit {
    pub fn key(&self) -> &LimiterKey {
        &self.key
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut slots = self.shared.lock();
        super::release_slot(&mut slots, &self.key);
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit").field("key", &self.key).finish()
    }
}
