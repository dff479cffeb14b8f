//! Shared helpers for scheduler scenario tests: a transport driven by
//! per-path scripts, and polling helpers that work with a paused clock.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use xfer_core::config::XferConfig;
use xfer_core::record::{TransferId, TransferRequest, TransferResult, TransferSnapshot};
use xfer_core::registry::TaskSignals;
use xfer_core::scheduler::{EventStream, Scheduler, SchedulerHandle, TransferEvent};
use xfer_core::status::TransferStatus;
use xfer_core::store::{MemoryStore, MetadataStore};
use xfer_core::transport::{ProgressReporter, TransferJob, Transport, TransportError};

pub const SERVER: &str = "https://cloud.example.com";

/// What one attempt of a scripted transfer does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Report progress in a few chunks, then succeed.
    Succeed,
    /// Succeed after `chunks` one-second chunks, honouring pause/cancel.
    Slow { chunks: u32 },
    /// Wait for a gate permit (see `ScriptedTransport::open_gate`), then succeed.
    Gated,
    /// Fail immediately.
    Fail(TransportError),
    /// Never report anything; only cancellation ends it.
    Hang,
}

#[derive(Debug, Clone)]
pub struct Started {
    pub remote_path: String,
    pub attempt: u32,
    pub at: Instant,
}

/// Transport whose attempts follow per-remote-path scripts. Paths without a
/// script (or with an exhausted one) use the default step.
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    default_step: Step,
    gate: Semaphore,
    started: Mutex<Vec<Started>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedTransport {
    pub fn new(default_step: Step) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            default_step,
            gate: Semaphore::new(0),
            started: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        })
    }

    pub fn script(&self, remote_path: &str, steps: impl IntoIterator<Item = Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(remote_path.to_string(), steps.into_iter().collect());
    }

    /// Let `n` gated attempts finish.
    pub fn open_gate(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn started(&self) -> Vec<Started> {
        self.started.lock().unwrap().clone()
    }

    pub fn started_paths(&self) -> Vec<String> {
        self.started().into_iter().map(|s| s.remote_path).collect()
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    fn next_step(&self, remote_path: &str) -> Step {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(remote_path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default_step.clone())
    }

    async fn chunks(
        n: u32,
        pause: Duration,
        progress: &ProgressReporter,
        signals: &mut TaskSignals,
    ) -> Result<u64, TransportError> {
        let mut done = 0;
        for _ in 0..n {
            signals.checkpoint().await?;
            tokio::time::sleep(pause).await;
            done += 100;
            progress.report(done);
        }
        Ok(done)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn transfer(
        &self,
        job: TransferJob,
        progress: ProgressReporter,
        mut signals: TaskSignals,
    ) -> Result<TransferResult, TransportError> {
        let step = self.next_step(&job.remote_path);
        self.started.lock().unwrap().push(Started {
            remote_path: job.remote_path.clone(),
            attempt: job.attempt,
            at: Instant::now(),
        });
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        let size = match step {
            Step::Succeed => {
                Self::chunks(4, Duration::from_millis(5), &progress, &mut signals).await?
            }
            Step::Slow { chunks } => {
                Self::chunks(chunks, Duration::from_secs(1), &progress, &mut signals).await?
            }
            Step::Gated => {
                progress.report(1);
                tokio::select! {
                    permit = self.gate.acquire() => {
                        if let Ok(p) = permit {
                            p.forget();
                        }
                    }
                    _ = signals.cancelled() => return Err(TransportError::connection("cancelled")),
                }
                signals.checkpoint().await?;
                progress.report(100);
                100
            }
            Step::Fail(err) => return Err(err),
            Step::Hang => {
                signals.cancelled().await;
                return Err(TransportError::connection("cancelled"));
            }
        };
        Ok(TransferResult {
            size,
            etag: Some(format!("etag-{}", job.remote_path)),
            file_id: Some(format!("id-{}", job.id)),
            modified: Some(1_700_000_000),
        })
    }
}

/// Config for scenario tests: tight limits, long stall timeout.
pub fn config(per_host: usize) -> XferConfig {
    XferConfig {
        max_concurrent_per_host: per_host,
        stalled_timeout_secs: 3600,
        ..XferConfig::default()
    }
}

pub struct Harness {
    pub handle: SchedulerHandle,
    pub events: EventStream,
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<MemoryStore>,
}

pub fn start(config: XferConfig, transport: Arc<ScriptedTransport>) -> Harness {
    start_with_store(config, transport, Arc::new(MemoryStore::new()))
}

pub fn start_with_store(
    config: XferConfig,
    transport: Arc<ScriptedTransport>,
    store: Arc<MemoryStore>,
) -> Harness {
    let (handle, events) = Scheduler::start(
        config,
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::clone(&store) as Arc<dyn MetadataStore>,
    )
    .unwrap();
    Harness {
        handle,
        events,
        transport,
        store,
    }
}

pub fn download(id: &str) -> TransferRequest {
    TransferRequest::download("alice", SERVER, format!("/{id}"), format!("/tmp/{id}")).with_id(id)
}

pub fn upload(id: &str) -> TransferRequest {
    TransferRequest::upload("alice", SERVER, format!("/{id}"), format!("/tmp/{id}")).with_id(id)
}

pub fn tid(id: &str) -> TransferId {
    TransferId::from(id)
}

/// Poll `cond` (advancing the paused clock in small steps) until it holds.
pub async fn eventually<F, Fut>(what: &str, mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..2_000 {
        if cond().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

pub async fn wait_for_status(handle: &SchedulerHandle, id: &str, status: TransferStatus) {
    let id = &tid(id);
    eventually(&format!("{id} to reach {status}"), || async move {
        handle.status(id).await.map(|s| s.status) == Ok(status)
    })
    .await;
}

pub async fn snapshot(handle: &SchedulerHandle, id: &str) -> TransferSnapshot {
    handle.status(&tid(id)).await.unwrap()
}

/// Every event currently buffered.
pub fn drain_events(events: &mut EventStream) -> Vec<TransferEvent> {
    let mut out = Vec::new();
    while let Some(ev) = events.try_recv() {
        out.push(ev);
    }
    out
}
