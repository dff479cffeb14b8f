//! The scheduler task. It owns the queues, the registry and the finished
//! table; nothing else touches them.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

use super::event::{TaskEvent, TransferEvent};
use super::finished::FinishedTable;
use super::handle::{Command, Submitted};
use crate::config::XferConfig;
use crate::error::{XferError, XferResult};
use crate::limiter::HostLimiter;
use crate::queue::QueueSet;
use crate::record::{Direction, TransferId, TransferRecord, TransferRequest, TransferSnapshot};
use crate::registry::TaskRegistry;
use crate::retry::RetryPolicy;
use crate::status::TransferStatus;
use crate::store::MetadataStore;
use crate::transport::Transport;

pub(crate) struct Actor {
    pub(super) config: XferConfig,
    pub(super) policy: RetryPolicy,
    pub(super) limiter: HostLimiter,
    pub(super) queues: QueueSet,
    pub(super) registry: TaskRegistry,
    pub(super) finished: FinishedTable,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) store: Arc<dyn MetadataStore>,
    pub(super) events: mpsc::UnboundedSender<TransferEvent>,
    pub(super) task_tx: mpsc::UnboundedSender<TaskEvent>,
    /// Last dispatch generation handed out.
    pub(super) attempts: u64,
    /// The store holds pending records that did not fit under the capacity.
    backlog: bool,
    drain_waiters: Vec<oneshot::Sender<()>>,
}

impl Actor {
    pub(crate) fn new(
        config: XferConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn MetadataStore>,
        events: mpsc::UnboundedSender<TransferEvent>,
        task_tx: mpsc::UnboundedSender<TaskEvent>,
    ) -> Self {
        Self {
            policy: config.retry_policy(),
            limiter: HostLimiter::new(config.max_concurrent_per_host),
            queues: QueueSet::new(),
            registry: TaskRegistry::new(),
            finished: FinishedTable::new(config.max_finished_retained),
            config,
            transport,
            store,
            events,
            task_tx,
            attempts: 0,
            backlog: false,
            drain_waiters: Vec::new(),
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut task_rx: mpsc::UnboundedReceiver<TaskEvent>,
    ) {
        self.recover().await;
        self.dispatch().await;

        let period = self.config.sweep_interval().max(std::time::Duration::from_millis(1));
        let mut sweep = tokio::time::interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(event) = task_rx.recv() => self.handle_task_event(event).await,
                _ = sweep.tick() => self.sweep().await,
            }
            if self.backlog && self.live() < self.config.max_queue_capacity {
                self.recover().await;
            }
            self.dispatch().await;
            self.notify_drained();
        }
        tracing::info!("scheduler stopped");
    }

    /// Re-queue what the store still considers unfinished, up to the queue
    /// capacity. Anything beyond it stays pending in the store and is picked
    /// up once transfers finish.
    async fn recover(&mut self) {
        let pending = match self.store.load_pending().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("could not load pending transfers: {e:#}");
                self.backlog = false;
                return;
            }
        };
        let limit = self.config.max_queue_capacity;
        let mut queued = 0usize;
        let mut deferred = 0usize;
        for record in pending {
            if self.lookup(&record.id).is_some() {
                continue;
            }
            if self.live() >= limit {
                deferred += 1;
                continue;
            }
            let record = self.prepare_for_queue(record);
            self.persist_status(&record).await;
            self.queues.enqueue(record);
            queued += 1;
        }
        if queued > 0 {
            tracing::info!(count = queued, "recovered pending transfers");
        }
        if deferred > 0 {
            tracing::warn!(
                deferred,
                limit,
                "queue full, leaving transfers pending in the store"
            );
        }
        self.backlog = deferred > 0;
    }

    /// Records counted against `max_queue_capacity`.
    fn live(&self) -> usize {
        self.queues.total_len() + self.registry.len()
    }

    fn shutdown(&mut self) {
        let interrupted = self.registry.drain();
        tracing::info!(
            running = interrupted.len(),
            queued = self.queues.total_len(),
            "scheduler shutting down"
        );
        self.drain_waiters.clear();
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Submit { request, reply } => {
                let _ = reply.send(self.submit(request).await);
            }
            Command::Cancel { id, reply } => {
                let _ = reply.send(self.cancel(&id).await);
            }
            Command::Suspend { id, reply } => {
                let _ = reply.send(self.suspend(&id).await);
            }
            Command::Resume { id, reply } => {
                let _ = reply.send(self.resume(&id).await);
            }
            Command::Status { id, reply } => {
                let _ = reply.send(self.lookup(&id).ok_or(XferError::NotFound(id)));
            }
            Command::List { reply } => {
                let _ = reply.send(self.list());
            }
            Command::Acknowledge { id, reply } => {
                let _ = reply.send(self.acknowledge(&id).await);
            }
            Command::Drain { reply } => self.drain_waiters.push(reply),
            // Handled by the run loop.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.queues.total_len() == 0 && self.registry.is_empty()
    }

    fn notify_drained(&mut self) {
        if self.is_idle() {
            for waiter in self.drain_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    pub(super) fn lookup(&self, id: &TransferId) -> Option<TransferSnapshot> {
        if let Some(entry) = self.registry.get(id) {
            return Some(entry.record.snapshot());
        }
        self.queues
            .get(id)
            .or_else(|| self.finished.get(id))
            .map(TransferRecord::snapshot)
    }

    fn list(&self) -> Vec<TransferSnapshot> {
        let mut out = self.registry.snapshots();
        out.extend(self.queues.peek_all());
        out.extend(self.finished.iter().map(TransferRecord::snapshot));
        out
    }

    async fn submit(&mut self, request: TransferRequest) -> XferResult<Submitted> {
        if let Some(existing) = request.id.as_ref().and_then(|id| self.lookup(id)) {
            tracing::debug!(id = %existing.id, status = %existing.status, "duplicate submission");
            return Ok(Submitted::Duplicate(existing));
        }
        let limit = self.config.max_queue_capacity;
        if self.live() >= limit {
            return Err(XferError::CapacityExceeded { limit });
        }
        let record = TransferRecord::from_request(request)?;
        let record = self.prepare_for_queue(record);
        let id = record.id.clone();
        tracing::info!(
            id = %id,
            account = %record.account,
            direction = record.direction.as_str(),
            forced = record.forced,
            "transfer queued"
        );
        self.persist(&record).await;
        self.queues.enqueue(record);
        Ok(Submitted::Queued(id))
    }

    /// Forced uploads wait in `UploadForcedStart` so their priority shows
    /// up in status queries.
    pub(super) fn prepare_for_queue(&self, mut record: TransferRecord) -> TransferRecord {
        if record.forced
            && record.direction == Direction::Upload
            && record.status() == TransferStatus::QueuedForUpload
        {
            if let Err(e) = record.set_status(TransferStatus::UploadForcedStart) {
                tracing::error!(id = %record.id, "{e}");
            }
        }
        record
    }

    async fn cancel(&mut self, id: &TransferId) -> XferResult<TransferStatus> {
        if let Some(done) = self.finished.get(id) {
            return Ok(done.status());
        }
        let record = if self.registry.contains(id) {
            self.registry.cancel(id)?
        } else if let Some(mut record) = self.queues.remove(id) {
            record.set_status(TransferStatus::Cancelled)?;
            record
        } else {
            return Err(XferError::NotFound(id.clone()));
        };
        tracing::info!(id = %id, "transfer cancelled");
        self.persist_status(&record).await;
        self.emit_failure(&record, XferError::Cancelled);
        let status = record.status();
        self.finished.push(record);
        Ok(status)
    }

    async fn suspend(&mut self, id: &TransferId) -> XferResult<()> {
        if !self.registry.contains(id) {
            return match self.lookup(id) {
                Some(_) => Err(XferError::NotRunning(id.clone())),
                None => Err(XferError::NotFound(id.clone())),
            };
        }
        self.registry.suspend(id)?;
        if let Some(entry) = self.registry.get(id) {
            tracing::info!(id = %id, "transfer suspended");
            self.persist_status(&entry.record).await;
        }
        Ok(())
    }

    async fn resume(&mut self, id: &TransferId) -> XferResult<TransferStatus> {
        if !self.registry.contains(id) {
            return match self.lookup(id) {
                Some(_) => Err(XferError::NotSuspended(id.clone())),
                None => Err(XferError::NotFound(id.clone())),
            };
        }
        let status = self.registry.resume(id, Instant::now())?;
        if let Some(entry) = self.registry.get(id) {
            tracing::info!(id = %id, status = %status, "transfer resumed");
            self.persist_status(&entry.record).await;
        }
        Ok(status)
    }

    async fn acknowledge(&mut self, id: &TransferId) -> XferResult<()> {
        if self.finished.remove(id).is_none() {
            return Err(XferError::NotFound(id.clone()));
        }
        if let Err(e) = self.store.remove(id).await {
            tracing::warn!(id = %id, "store remove failed: {e:#}");
        }
        Ok(())
    }

    pub(super) fn emit(&self, event: TransferEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    pub(super) fn emit_failure(&self, record: &TransferRecord, error: XferError) {
        self.emit(TransferEvent::Failed {
            account: record.account.clone(),
            id: record.id.clone(),
            direction: record.direction,
            error,
        });
    }

    pub(super) async fn persist(&self, record: &TransferRecord) {
        if let Err(e) = self.store.save(record).await {
            tracing::warn!(id = %record.id, "store save failed: {e:#}");
        }
    }

    pub(super) async fn persist_status(&self, record: &TransferRecord) {
        if let Err(e) = self.store.write_status(&record.id, record.status()).await {
            tracing::warn!(id = %record.id, "store write failed: {e:#}");
        }
    }
}
