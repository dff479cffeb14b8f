//! `xfer add-download` / `xfer add-upload` – queue a transfer in the store.
//! The next `xfer run` picks it up.

use std::path::PathBuf;

use anyhow::Result;
use xfer_core::record::{TransferRecord, TransferRequest};
use xfer_core::store::MetadataStore;

use crate::cli::AddOptions;

#[derive(Debug)]
pub struct AddArgs {
    request: TransferRequest,
}

impl AddArgs {
    pub fn download(remote_path: String, local_path: PathBuf, opts: AddOptions) -> Self {
        let request =
            TransferRequest::download(opts.account.clone(), opts.server.clone(), remote_path, local_path);
        Self::with_options(request, opts)
    }

    pub fn upload(remote_path: String, local_path: PathBuf, opts: AddOptions) -> Self {
        let request =
            TransferRequest::upload(opts.account.clone(), opts.server.clone(), remote_path, local_path);
        Self::with_options(request, opts)
    }

    fn with_options(mut request: TransferRequest, opts: AddOptions) -> Self {
        if let Some(id) = opts.id {
            request = request.with_id(id);
        }
        if let Some(size) = opts.size {
            request = request.with_expected_size(size);
        }
        request = request.on_network(opts.network.into());
        if opts.forced {
            request = request.forced();
        }
        Self { request }
    }

    pub fn request(&self) -> &TransferRequest {
        &self.request
    }
}

pub async fn run_add(store: &dyn MetadataStore, args: AddArgs) -> Result<()> {
    let record = TransferRecord::from_request(args.request)?;
    if let Some(status) = store.read_status(&record.id).await? {
        println!("Transfer {} already exists ({status})", record.id);
        return Ok(());
    }
    store.save(&record).await?;
    println!(
        "Queued {} {} ({})",
        record.direction.as_str(),
        record.id,
        record.remote_path
    );
    Ok(())
}
