//! A transport whose "server" is a local directory.
//!
//! Remote paths are resolved under `root`; downloads copy from there to the
//! record's local path and uploads copy the other way. Data is written to a
//! `.part` file and renamed into place once complete.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{ProgressReporter, Transport, TransportError};
use crate::checksum::sha256_path_async;
use crate::record::{Direction, TransferResult};
use crate::registry::TaskSignals;
use crate::retry::ErrorKind;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct DirectoryTransport {
    root: PathBuf,
    chunk_size: usize,
}

impl DirectoryTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Smaller chunks mean more progress reports and checkpoints.
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a remote path onto the root, refusing anything that escapes it.
    fn resolve(&self, remote_path: &str) -> Result<PathBuf, TransportError> {
        let rel = Path::new(remote_path.trim_start_matches('/'));
        if rel.as_os_str().is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(TransportError::new(
                ErrorKind::Other,
                format!("invalid remote path: {remote_path}"),
            ));
        }
        Ok(self.root.join(rel))
    }

    async fn copy(
        &self,
        src: &Path,
        dest: &Path,
        progress: &ProgressReporter,
        signals: &mut TaskSignals,
    ) -> Result<u64, TransportError> {
        let mut reader = tokio::fs::File::open(src)
            .await
            .map_err(|e| TransportError::io(&format!("open {}", src.display()), &e))?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransportError::io(&format!("create {}", parent.display()), &e))?;
        }
        let part = PartFile::new(part_path(dest));
        let mut writer = tokio::fs::File::create(part.path())
            .await
            .map_err(|e| TransportError::io(&format!("create {}", part.display()), &e))?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut done = 0u64;
        loop {
            signals.checkpoint().await?;
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| TransportError::io(&format!("read {}", src.display()), &e))?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .await
                .map_err(|e| TransportError::io(&format!("write {}", part.display()), &e))?;
            done += n as u64;
            progress.report(done);
        }
        writer
            .flush()
            .await
            .map_err(|e| TransportError::io(&format!("flush {}", part.display()), &e))?;
        drop(writer);
        tokio::fs::rename(part.path(), dest)
            .await
            .map_err(|e| TransportError::io(&format!("rename {}", part.display()), &e))?;
        part.keep();
        Ok(done)
    }
}

/// A `.part` file that is removed when dropped, unless it was renamed into
/// place. Covers errors, cancellation and the task being aborted mid-copy.
struct PartFile {
    path: PathBuf,
    armed: bool,
}

impl PartFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> std::path::Display<'_> {
        self.path.display()
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[async_trait]
impl Transport for DirectoryTransport {
    async fn transfer(
        &self,
        job: super::TransferJob,
        progress: ProgressReporter,
        mut signals: TaskSignals,
    ) -> Result<TransferResult, TransportError> {
        let remote = self.resolve(&job.remote_path)?;
        let (src, dest) = match job.direction {
            Direction::Download => (remote.clone(), job.local_path.clone()),
            Direction::Upload => (job.local_path.clone(), remote.clone()),
        };
        tracing::debug!(
            id = %job.id,
            attempt = job.attempt,
            src = %src.display(),
            dest = %dest.display(),
            "directory transfer"
        );
        let size = self.copy(&src, &dest, &progress, &mut signals).await?;

        let etag = sha256_path_async(dest.clone())
            .await
            .map_err(|e| TransportError::new(ErrorKind::Other, format!("{e:#}")))?;
        let modified = tokio::fs::metadata(&remote)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);
        Ok(TransferResult {
            size,
            etag: Some(etag),
            file_id: Some(job.remote_path.trim_start_matches('/').to_string()),
            modified,
        })
    }
}
