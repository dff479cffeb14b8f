//! Control socket: server (during `xfer run`) and client (for `xfer cancel`,
//! `xfer suspend`, `xfer resume`).
//!
//! Protocol: one line per request, `<verb> <id>`, answered by one line:
//! `ok <status>` or `error <message>`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use xfer_core::record::TransferId;
use xfer_core::scheduler::SchedulerHandle;

/// Socket path under XDG state: `~/.local/state/xfer/control.sock`.
pub fn default_control_socket_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("xfer")?;
    Ok(xdg_dirs.get_state_home().join("xfer").join("control.sock"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlVerb {
    Cancel,
    Suspend,
    Resume,
}

impl ControlVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlVerb::Cancel => "cancel",
            ControlVerb::Suspend => "suspend",
            ControlVerb::Resume => "resume",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "cancel" => Some(ControlVerb::Cancel),
            "suspend" => Some(ControlVerb::Suspend),
            "resume" => Some(ControlVerb::Resume),
            _ => None,
        }
    }
}

/// Parse one request line. `None` for anything malformed.
pub fn parse_request(line: &str) -> Option<(ControlVerb, TransferId)> {
    let (verb, id) = line.trim().split_once(' ')?;
    let id = id.trim();
    if id.is_empty() || id.contains(char::is_whitespace) {
        return None;
    }
    Some((ControlVerb::parse(verb)?, TransferId::from(id)))
}

/// Run one request against the scheduler and format the reply line.
pub async fn execute(handle: &SchedulerHandle, verb: ControlVerb, id: &TransferId) -> String {
    let result = match verb {
        ControlVerb::Cancel => handle.cancel(id).await.map(|s| s.to_string()),
        ControlVerb::Suspend => handle.suspend(id).await.map(|()| "suspended".to_string()),
        ControlVerb::Resume => handle.resume(id).await.map(|s| s.to_string()),
    };
    match result {
        Ok(status) => format!("ok {status}"),
        Err(e) => format!("error {e}"),
    }
}

/// Spawns a task that listens on `path` and forwards each request to the
/// scheduler behind `handle`.
pub fn spawn_control_listener(
    handle: SchedulerHandle,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let _ = std::fs::remove_file(&path);
    let listener =
        UnixListener::bind(&path).with_context(|| format!("bind {}", path.display()))?;

    let task = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let handle = handle.clone();
                    tokio::spawn(serve_connection(stream, handle));
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(task)
}

async fn serve_connection(stream: UnixStream, handle: SchedulerHandle) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let reply = match parse_request(&line) {
            Some((verb, id)) => execute(&handle, verb, &id).await,
            None => format!("error malformed request: {}", line.trim()),
        };
        if write.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
            break;
        }
    }
}

/// Send one request and return the `ok` payload. `Ok(None)` when no
/// scheduler is listening on `socket_path`.
pub async fn send_command(
    socket_path: &Path,
    verb: ControlVerb,
    id: &TransferId,
) -> Result<Option<String>> {
    if !socket_path.exists() {
        return Ok(None);
    }
    let stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(path = %socket_path.display(), "control socket connect: {}", e);
            return Ok(None);
        }
    };
    let (read, mut write) = stream.into_split();
    write
        .write_all(format!("{} {}\n", verb.as_str(), id).as_bytes())
        .await?;
    let reply = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .context("control socket closed without a reply")?;
    match reply.split_once(' ') {
        Some(("ok", rest)) => Ok(Some(rest.to_string())),
        Some(("error", rest)) => bail!("{rest}"),
        _ => bail!("unexpected control reply: {reply}"),
    }
}
