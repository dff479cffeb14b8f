//! Caller-facing API. Every method is a request/reply round trip to the
//! scheduler task.

use tokio::sync::{mpsc, oneshot};

use crate::error::{XferError, XferResult};
use crate::record::{TransferId, TransferRequest, TransferSnapshot};
use crate::status::TransferStatus;

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    /// A new transfer was queued under this id.
    Queued(TransferId),
    /// The id is already known; nothing changed.
    Duplicate(TransferSnapshot),
}

impl Submitted {
    pub fn id(&self) -> &TransferId {
        match self {
            Submitted::Queued(id) => id,
            Submitted::Duplicate(snap) => &snap.id,
        }
    }
}

pub(crate) type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
pub(crate) enum Command {
    Submit {
        request: TransferRequest,
        reply: Reply<XferResult<Submitted>>,
    },
    Cancel {
        id: TransferId,
        reply: Reply<XferResult<TransferStatus>>,
    },
    Suspend {
        id: TransferId,
        reply: Reply<XferResult<()>>,
    },
    Resume {
        id: TransferId,
        reply: Reply<XferResult<TransferStatus>>,
    },
    Status {
        id: TransferId,
        reply: Reply<XferResult<TransferSnapshot>>,
    },
    List {
        reply: Reply<Vec<TransferSnapshot>>,
    },
    Acknowledge {
        id: TransferId,
        reply: Reply<XferResult<()>>,
    },
    Drain {
        reply: Reply<()>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Cloneable handle to a running scheduler. Once every handle is dropped
/// the scheduler shuts down.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> XferResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| XferError::SchedulerStopped)?;
        rx.await.map_err(|_| XferError::SchedulerStopped)
    }

    /// Queue a transfer. Resubmitting a known id returns its current state.
    pub async fn submit(&self, request: TransferRequest) -> XferResult<Submitted> {
        self.call(|reply| Command::Submit { request, reply }).await?
    }

    /// Stop a queued or running transfer. Cancelling a finished transfer is
    /// a no-op that returns its final status.
    pub async fn cancel(&self, id: &TransferId) -> XferResult<TransferStatus> {
        let id = id.clone();
        self.call(|reply| Command::Cancel { id, reply }).await?
    }

    /// Pause a running transfer. It keeps its host slot.
    pub async fn suspend(&self, id: &TransferId) -> XferResult<()> {
        let id = id.clone();
        self.call(|reply| Command::Suspend { id, reply }).await?
    }

    /// Continue a suspended transfer; returns the status it resumed into.
    pub async fn resume(&self, id: &TransferId) -> XferResult<TransferStatus> {
        let id = id.clone();
        self.call(|reply| Command::Resume { id, reply }).await?
    }

    pub async fn status(&self, id: &TransferId) -> XferResult<TransferSnapshot> {
        let id = id.clone();
        self.call(|reply| Command::Status { id, reply }).await?
    }

    /// Running, queued and retained finished transfers, in that order.
    pub async fn list(&self) -> XferResult<Vec<TransferSnapshot>> {
        self.call(|reply| Command::List { reply }).await
    }

    /// Forget a finished transfer.
    pub async fn acknowledge(&self, id: &TransferId) -> XferResult<()> {
        let id = id.clone();
        self.call(|reply| Command::Acknowledge { id, reply }).await?
    }

    /// Resolves once nothing is queued or running.
    pub async fn drain(&self) -> XferResult<()> {
        self.call(|reply| Command::Drain { reply }).await
    }

    /// Stop every running transport and the scheduler itself. Interrupted
    /// transfers emit no notification; they are picked up from the store on
    /// the next start.
    pub async fn shutdown(&self) -> XferResult<()> {
        self.call(|reply| Command::Shutdown { reply }).await
    }
}
