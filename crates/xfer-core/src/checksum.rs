//! SHA-256 digests of local files, used as the ETag of transfers that go
//! through the directory transport.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const BUF_SIZE: usize = 64 * 1024;

/// Lowercase hex SHA-256 of the file at `path`, read in bounded chunks.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Same as [`sha256_path`], off the async runtime's worker threads.
pub async fn sha256_path_async(path: PathBuf) -> Result<String> {
    tokio::task::spawn_blocking(move || sha256_path(&path))
        .await
        .context("checksum task panicked")?
}
