//! CLI for the xfer transfer scheduler.

mod commands;
mod control_socket;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use xfer_core::config;
use xfer_core::record::NetworkClass;
use xfer_core::store::SqliteStore;

use commands::{
    run_add, run_completions, run_control, run_man, run_scheduler, run_status, AddArgs,
};
use control_socket::ControlVerb;

/// Top-level CLI for xfer.
#[derive(Debug, Parser)]
#[command(name = "xfer")]
#[command(about = "xfer: queued uploads and downloads with per-host limits", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Network class as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NetworkArg {
    Foreground,
    Background,
    Cellular,
}

impl From<NetworkArg> for NetworkClass {
    fn from(n: NetworkArg) -> Self {
        match n {
            NetworkArg::Foreground => NetworkClass::Foreground,
            NetworkArg::Background => NetworkClass::Background,
            NetworkArg::Cellular => NetworkClass::Cellular,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a download of REMOTE_PATH to LOCAL_PATH.
    AddDownload {
        /// Path on the server, e.g. /Photos/a.jpg.
        remote_path: String,
        /// Destination on this machine.
        local_path: PathBuf,
        #[command(flatten)]
        opts: AddOptions,
    },

    /// Queue an upload of LOCAL_PATH to REMOTE_PATH.
    AddUpload {
        /// Source on this machine.
        local_path: PathBuf,
        /// Path on the server.
        remote_path: String,
        #[command(flatten)]
        opts: AddOptions,
    },

    /// Show every stored transfer.
    Status {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Run the scheduler until every queued transfer has finished.
    Run {
        /// Directory standing in for the server.
        #[arg(long, value_name = "DIR")]
        remote_root: PathBuf,
    },

    /// Cancel a queued or running transfer.
    Cancel {
        /// Transfer identifier.
        id: String,
    },

    /// Suspend a running transfer (requires an active `xfer run`).
    Suspend {
        /// Transfer identifier.
        id: String,
    },

    /// Resume a suspended transfer (requires an active `xfer run`).
    Resume {
        /// Transfer identifier.
        id: String,
    },

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Print the man page.
    Man,
}

/// Options shared by add-download and add-upload.
#[derive(Debug, Clone, clap::Args)]
pub struct AddOptions {
    /// Server base URL; its scheme, host and port select the concurrency slot.
    #[arg(long, default_value = "https://localhost")]
    pub server: String,
    /// Account the transfer belongs to.
    #[arg(long, default_value = "default")]
    pub account: String,
    /// Caller-chosen id (a UUID is generated otherwise).
    #[arg(long)]
    pub id: Option<String>,
    /// Expected size in bytes, if known.
    #[arg(long, value_name = "BYTES")]
    pub size: Option<u64>,
    #[arg(long, value_enum, default_value = "foreground")]
    pub network: NetworkArg,
    /// Start ahead of everything already queued.
    #[arg(long)]
    pub forced: bool,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        match &cli.command {
            CliCommand::Completions { shell } => return run_completions(*shell),
            CliCommand::Man => return run_man(),
            _ => {}
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = SqliteStore::open_default().await?;

        match cli.command {
            CliCommand::AddDownload {
                remote_path,
                local_path,
                opts,
            } => run_add(&store, AddArgs::download(remote_path, local_path, opts)).await?,
            CliCommand::AddUpload {
                local_path,
                remote_path,
                opts,
            } => run_add(&store, AddArgs::upload(remote_path, local_path, opts)).await?,
            CliCommand::Status { json } => run_status(&store, json).await?,
            CliCommand::Run { remote_root } => run_scheduler(store, cfg, &remote_root).await?,
            CliCommand::Cancel { id } => run_control(&store, ControlVerb::Cancel, &id).await?,
            CliCommand::Suspend { id } => run_control(&store, ControlVerb::Suspend, &id).await?,
            CliCommand::Resume { id } => run_control(&store, ControlVerb::Resume, &id).await?,
            CliCommand::Completions { .. } | CliCommand::Man => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
