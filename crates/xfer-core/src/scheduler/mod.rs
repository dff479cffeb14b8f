//! The scheduler: one task that owns every queued and running transfer.
//!
//! Callers talk to it through [`SchedulerHandle`]; transport tasks and
//! timers send it [`TaskEvent`]s on a second channel. Both channels are
//! drained by the same loop, so state changes never race each other.
//!
//! Per direction the loop repeats the same cycle:
//! - dispatch queued records while their host has a free slot,
//! - move `Preparing*` to `*ing` on the first progress report,
//! - on success mark `Done`, release the slot and notify,
//! - on a recoverable failure requeue at the tail after a backoff while the
//!   retry budget lasts, otherwise fail terminally and notify,
//! - every sweep interval, time out transfers that stopped reporting.

mod actor;
mod dispatch;
mod event;
mod finish;
mod finished;
mod handle;
mod sweep;

pub use event::{EventStream, TransferEvent};
pub use handle::{SchedulerHandle, Submitted};
pub(crate) use event::TaskEvent;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::config::XferConfig;
use crate::store::MetadataStore;
use crate::transport::Transport;

const COMMAND_BUFFER: usize = 64;

pub struct Scheduler;

impl Scheduler {
    /// Spawn the scheduler task on the current tokio runtime. Transfers the
    /// store still has pending are queued again before the first command is
    /// served. Fails if `config` does not pass [`XferConfig::validate`].
    pub fn start(
        config: XferConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn MetadataStore>,
    ) -> Result<(SchedulerHandle, EventStream)> {
        config.validate()?;
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (task_tx, task_rx) = mpsc::unbounded_channel();

        tracing::info!(
            per_host = config.max_concurrent_per_host,
            capacity = config.max_queue_capacity,
            max_retries = config.max_retries,
            "scheduler starting"
        );
        let actor = actor::Actor::new(config, transport, store, event_tx, task_tx);
        tokio::spawn(actor.run(cmd_rx, task_rx));

        Ok((SchedulerHandle::new(cmd_tx), EventStream::new(event_rx)))
    }
}
