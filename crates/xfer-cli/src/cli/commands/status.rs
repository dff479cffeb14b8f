//! `xfer status` – show every stored transfer.

use anyhow::Result;
use xfer_core::record::TransferSnapshot;
use xfer_core::store::MetadataStore;

pub async fn run_status(store: &dyn MetadataStore, json: bool) -> Result<()> {
    let snapshots: Vec<TransferSnapshot> = store
        .list()
        .await?
        .iter()
        .map(|r| r.snapshot())
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }
    if snapshots.is_empty() {
        println!("No transfers in database.");
        return Ok(());
    }
    println!(
        "{:<38} {:<8} {:<20} {:<7} {:<12} {}",
        "ID", "DIR", "STATUS", "RETRY", "BYTES", "REMOTE"
    );
    for s in snapshots {
        println!("{}", format_row(&s));
    }
    Ok(())
}

fn format_row(s: &TransferSnapshot) -> String {
    let bytes = if s.expected_size > 0 {
        format!("{}/{}", s.bytes_done, s.expected_size)
    } else {
        format!("{}", s.bytes_done)
    };
    format!(
        "{:<38} {:<8} {:<20} {:<7} {:<12} {}",
        s.id.as_str(),
        s.direction.as_str(),
        s.status.as_str(),
        s.retry_count,
        bytes,
        s.remote_path
    )
}
