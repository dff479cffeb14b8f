//! `xfer cancel|suspend|resume <id>` – talk to a running `xfer run`.
//!
//! Without a running scheduler only cancel can do anything: it marks a
//! pending record cancelled in the store so the next run skips it.

use anyhow::{bail, Result};
use xfer_core::record::TransferId;
use xfer_core::status::TransferStatus;
use xfer_core::store::MetadataStore;
use xfer_core::XferError;

use crate::cli::control_socket::{self, ControlVerb};

pub async fn run_control(store: &dyn MetadataStore, verb: ControlVerb, id: &str) -> Result<()> {
    let id = TransferId::from(id);
    let socket = control_socket::default_control_socket_path()?;
    if let Some(status) = control_socket::send_command(&socket, verb, &id).await? {
        println!("{} {id}: {status}", verb.as_str());
        return Ok(());
    }

    match verb {
        ControlVerb::Cancel => {
            let status = cancel_offline(store, &id).await?;
            println!("cancel {id}: {status}");
            Ok(())
        }
        ControlVerb::Suspend | ControlVerb::Resume => {
            bail!("no scheduler running; start one with `xfer run`")
        }
    }
}

/// Mark a stored, unfinished transfer cancelled. Finished transfers keep
/// their final status.
pub(crate) async fn cancel_offline(
    store: &dyn MetadataStore,
    id: &TransferId,
) -> Result<TransferStatus> {
    let status = match store.read_status(id).await? {
        Some(s) => s,
        None => return Err(XferError::NotFound(id.clone()).into()),
    };
    let pending =
        status.is_queued() || status.is_active() || status == TransferStatus::Suspended;
    if !pending {
        return Ok(status);
    }
    store.write_status(id, TransferStatus::Cancelled).await?;
    tracing::info!(%id, from = %status, "cancelled while no scheduler was running");
    Ok(TransferStatus::Cancelled)
}
