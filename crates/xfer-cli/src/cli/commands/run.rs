//! `xfer run` – run the scheduler over every pending transfer in the store,
//! using a local directory as the server.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use xfer_core::config::XferConfig;
use xfer_core::scheduler::{Scheduler, TransferEvent};
use xfer_core::store::{MetadataStore, SqliteStore};
use xfer_core::transport::DirectoryTransport;

use crate::cli::control_socket;

/// What one `xfer run` did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    /// Stopped by Ctrl-C before the queue drained.
    pub interrupted: bool,
}

impl RunSummary {
    fn record(&mut self, event: &TransferEvent) {
        match event {
            TransferEvent::Completed { id, result, .. } => {
                self.completed += 1;
                println!("done    {id} ({} bytes)", result.size);
            }
            TransferEvent::Failed { id, error, .. } => {
                self.failed += 1;
                println!("failed  {id}: {error}");
            }
        }
    }
}

pub async fn run_scheduler(store: SqliteStore, cfg: XferConfig, remote_root: &Path) -> Result<()> {
    let socket = control_socket::default_control_socket_path().ok();
    let summary = run_until_drained(Arc::new(store), cfg, remote_root, socket.as_deref()).await?;
    if summary == RunSummary::default() {
        println!("No queued transfers.");
    } else {
        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            interrupted = summary.interrupted,
            "run finished"
        );
        println!(
            "{} completed, {} failed{}",
            summary.completed,
            summary.failed,
            if summary.interrupted { " (interrupted)" } else { "" }
        );
    }
    Ok(())
}

pub(crate) async fn run_until_drained(
    store: Arc<dyn MetadataStore>,
    cfg: XferConfig,
    remote_root: &Path,
    socket: Option<&Path>,
) -> Result<RunSummary> {
    if !remote_root.is_dir() {
        bail!("remote root {} is not a directory", remote_root.display());
    }
    let mut summary = RunSummary::default();
    if store.load_pending().await?.is_empty() {
        return Ok(summary);
    }

    let transport = Arc::new(DirectoryTransport::new(remote_root));
    let (handle, mut events) = Scheduler::start(cfg, transport, store)?;

    let listener = match socket {
        Some(path) => match control_socket::spawn_control_listener(handle.clone(), path) {
            Ok(task) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                Some(task)
            }
            Err(e) => {
                tracing::warn!("control socket unavailable: {:#}", e);
                None
            }
        },
        None => None,
    };

    let drained = handle.drain();
    tokio::pin!(drained);
    loop {
        tokio::select! {
            Some(event) = events.recv() => summary.record(&event),
            res = &mut drained => {
                res?;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; pending transfers resume on the next run");
                summary.interrupted = true;
                break;
            }
        }
    }
    while let Some(event) = events.try_recv() {
        summary.record(&event);
    }
    handle.shutdown().await?;

    if let Some(task) = listener {
        task.abort();
    }
    if let Some(path) = socket {
        let _ = std::fs::remove_file(path);
    }
    Ok(summary)
}
