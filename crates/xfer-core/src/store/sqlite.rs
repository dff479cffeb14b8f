//! SQLite-backed metadata store.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};

use super::MetadataStore;
use crate::limiter::HostKey;
use crate::record::{unix_timestamp, Direction, NetworkClass, TransferId, TransferRecord};
use crate::status::{StatusTracker, TransferStatus};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Transfer table in `~/.local/state/xfer/transfers.db`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("xfer")?;
        Ok(xdg_dirs.get_state_home().join("xfer").join("transfers.db"))
    }

    /// Open (or create) the default database and run migrations.
    pub async fn open_default() -> Result<Self> {
        Self::open_at(Self::default_path()?).await
    }

    /// Open (or create) the database at `path`, creating parent dirs.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await
            .with_context(|| format!("open {}", path.display()))?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. One connection, since every sqlite
    /// memory connection is its own database.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transfers (
                id TEXT PRIMARY KEY NOT NULL,
                account TEXT NOT NULL,
                server_url TEXT NOT NULL,
                network TEXT NOT NULL,
                direction TEXT NOT NULL,
                remote_path TEXT NOT NULL,
                local_path TEXT NOT NULL,
                expected_size INTEGER NOT NULL DEFAULT 0,
                bytes_done INTEGER NOT NULL DEFAULT 0,
                retry_count INTEGER NOT NULL DEFAULT 0,
                forced INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("create transfers table")?;
        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<TransferRecord> {
    let id: String = row.get("id");
    let server_url: String = row.get("server_url");
    let status_str: String = row.get("status");
    let direction_str: String = row.get("direction");
    let network_str: String = row.get("network");
    let local_path: String = row.get("local_path");
    let expected_size: i64 = row.get("expected_size");
    let bytes_done: i64 = row.get("bytes_done");
    let retry_count: i64 = row.get("retry_count");
    let forced: i64 = row.get("forced");

    let status = TransferStatus::parse(&status_str)
        .ok_or_else(|| anyhow!("transfer {id}: unknown status {status_str:?}"))?;
    let direction = Direction::parse(&direction_str)
        .ok_or_else(|| anyhow!("transfer {id}: unknown direction {direction_str:?}"))?;
    let host = HostKey::from_url(&server_url).with_context(|| format!("transfer {id}"))?;

    Ok(TransferRecord {
        id: TransferId::from(id),
        account: row.get("account"),
        server_url,
        host,
        network: NetworkClass::parse(&network_str).unwrap_or_default(),
        direction,
        remote_path: row.get("remote_path"),
        local_path: PathBuf::from(local_path),
        expected_size: expected_size.max(0) as u64,
        bytes_done: bytes_done.max(0) as u64,
        retry_count: retry_count.clamp(0, u32::MAX as i64) as u32,
        forced: forced != 0,
        created_at: row.get("created_at"),
        ready_at: None,
        tracker: StatusTracker::persisted(status),
    })
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn read_status(&self, id: &TransferId) -> Result<Option<TransferStatus>> {
        let row = sqlx::query("SELECT status FROM transfers WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| TransferStatus::parse(&r.get::<String, _>("status"))))
    }

    async fn write_status(&self, id: &TransferId, status: TransferStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE transfers
            SET status = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(status.as_str())
        .bind(unix_timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .with_context(|| format!("write status of {id}"))?;
        Ok(())
    }

    async fn save(&self, record: &TransferRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transfers (
                id, account, server_url, network, direction, remote_path,
                local_path, expected_size, bytes_done, retry_count, forced,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(id) DO UPDATE SET
                account = excluded.account,
                server_url = excluded.server_url,
                network = excluded.network,
                direction = excluded.direction,
                remote_path = excluded.remote_path,
                local_path = excluded.local_path,
                expected_size = excluded.expected_size,
                bytes_done = excluded.bytes_done,
                retry_count = excluded.retry_count,
                forced = excluded.forced,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.id.as_str())
        .bind(&record.account)
        .bind(&record.server_url)
        .bind(record.network.as_str())
        .bind(record.direction.as_str())
        .bind(&record.remote_path)
        .bind(record.local_path.to_string_lossy().into_owned())
        .bind(record.expected_size as i64)
        .bind(record.bytes_done as i64)
        .bind(record.retry_count as i64)
        .bind(record.forced as i64)
        .bind(record.status().as_str())
        .bind(record.created_at)
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await
        .with_context(|| format!("save transfer {}", record.id))?;
        Ok(())
    }

    async fn remove(&self, id: &TransferId) -> Result<()> {
        sqlx::query("DELETE FROM transfers WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("remove transfer {id}"))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TransferRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account, server_url, network, direction, remote_path,
                   local_path, expected_size, bytes_done, retry_count, forced,
                   status, created_at
            FROM transfers
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            match record_from_row(row) {
                Ok(rec) => out.push(rec),
                Err(e) => tracing::warn!("skipping unreadable transfer row: {e:#}"),
            }
        }
        Ok(out)
    }
}
