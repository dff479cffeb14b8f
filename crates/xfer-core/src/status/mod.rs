//! Transfer status state machine.
//!
//! `TransferStatus` is the closed set of states a transfer record can be in;
//! `StatusTracker` owns the current state of one record and rejects any move
//! that is not an allowed edge.

mod tracker;

pub use tracker::StatusTracker;

use serde::{Deserialize, Serialize};

use crate::record::Direction;

/// Status of a transfer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Idle, in sync with the server.
    Normal,
    /// Idle and hidden from listings.
    Hidden,
    QueuedForDownload,
    PreparingDownload,
    Downloading,
    DownloadFailed,
    QueuedForUpload,
    PreparingUpload,
    Uploading,
    UploadFailed,
    /// Upload promoted ahead of the normal queue order.
    UploadForcedStart,
    /// Transport paused by the caller; keeps its host permit.
    Suspended,
    Done,
    Cancelled,
}

impl TransferStatus {
    /// Initial status of a freshly submitted transfer.
    pub fn queued(direction: Direction) -> Self {
        match direction {
            Direction::Download => TransferStatus::QueuedForDownload,
            Direction::Upload => TransferStatus::QueuedForUpload,
        }
    }

    pub fn preparing(direction: Direction) -> Self {
        match direction {
            Direction::Download => TransferStatus::PreparingDownload,
            Direction::Upload => TransferStatus::PreparingUpload,
        }
    }

    pub fn transferring(direction: Direction) -> Self {
        match direction {
            Direction::Download => TransferStatus::Downloading,
            Direction::Upload => TransferStatus::Uploading,
        }
    }

    pub fn failed(direction: Direction) -> Self {
        match direction {
            Direction::Download => TransferStatus::DownloadFailed,
            Direction::Upload => TransferStatus::UploadFailed,
        }
    }

    pub fn is_queued(self) -> bool {
        matches!(
            self,
            TransferStatus::QueuedForDownload
                | TransferStatus::QueuedForUpload
                | TransferStatus::UploadForcedStart
        )
    }

    /// Preparing or transferring: a transport task owns the record.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TransferStatus::PreparingDownload
                | TransferStatus::Downloading
                | TransferStatus::PreparingUpload
                | TransferStatus::Uploading
        )
    }

    pub fn is_failed(self) -> bool {
        matches!(
            self,
            TransferStatus::DownloadFailed | TransferStatus::UploadFailed
        )
    }

    pub fn is_idle(self) -> bool {
        matches!(self, TransferStatus::Normal | TransferStatus::Hidden)
    }

    /// Whether `self -> to` is an edge of the state machine.
    ///
    /// `Suspended -> *` is not covered here: the only way out of a suspension
    /// is back to the state it interrupted, which `StatusTracker` remembers.
    pub fn can_transition_to(self, to: TransferStatus) -> bool {
        use TransferStatus::*;
        match (self, to) {
            (Normal, Hidden) | (Hidden, Normal) => true,
            (Normal, QueuedForDownload) | (Normal, QueuedForUpload) => true,

            (QueuedForDownload, PreparingDownload) => true,
            (PreparingDownload, Downloading) => true,
            (Downloading, Done) => true,
            (PreparingDownload, DownloadFailed) | (Downloading, DownloadFailed) => true,
            (DownloadFailed, QueuedForDownload) => true,

            (QueuedForUpload, PreparingUpload) => true,
            (QueuedForUpload, UploadForcedStart) => true,
            (UploadForcedStart, PreparingUpload) => true,
            (PreparingUpload, Uploading) => true,
            (Uploading, Done) => true,
            (PreparingUpload, UploadFailed) | (Uploading, UploadFailed) => true,
            (UploadFailed, QueuedForUpload) => true,

            (from, Suspended) => from.is_active(),
            (from, Cancelled) => from.is_queued() || from.is_active(),
            _ => false,
        }
    }

    /// Stable name used for persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Normal => "normal",
            TransferStatus::Hidden => "hidden",
            TransferStatus::QueuedForDownload => "queued_for_download",
            TransferStatus::PreparingDownload => "preparing_download",
            TransferStatus::Downloading => "downloading",
            TransferStatus::DownloadFailed => "download_failed",
            TransferStatus::QueuedForUpload => "queued_for_upload",
            TransferStatus::PreparingUpload => "preparing_upload",
            TransferStatus::Uploading => "uploading",
            TransferStatus::UploadFailed => "upload_failed",
            TransferStatus::UploadForcedStart => "upload_forced_start",
            TransferStatus::Suspended => "suspended",
            TransferStatus::Done => "done",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let status = match s {
            "normal" => TransferStatus::Normal,
            "hidden" => TransferStatus::Hidden,
            "queued_for_download" => TransferStatus::QueuedForDownload,
            "preparing_download" => TransferStatus::PreparingDownload,
            "downloading" => TransferStatus::Downloading,
            "download_failed" => TransferStatus::DownloadFailed,
            "queued_for_upload" => TransferStatus::QueuedForUpload,
            "preparing_upload" => TransferStatus::PreparingUpload,
            "uploading" => TransferStatus::Uploading,
            "upload_failed" => TransferStatus::UploadFailed,
            "upload_forced_start" => TransferStatus::UploadForcedStart,
            "suspended" => TransferStatus::Suspended,
            "done" => TransferStatus::Done,
            "cancelled" => TransferStatus::Cancelled,
            _ => return None,
        };
        Some(status)
    }

    /// Integer metadata status code as stored by older clients.
    pub fn code(self) -> i32 {
        match self {
            TransferStatus::Normal => 0,
            TransferStatus::Hidden => 1,
            TransferStatus::QueuedForDownload => 2,
            TransferStatus::PreparingDownload => 3,
            TransferStatus::Downloading => 4,
            TransferStatus::DownloadFailed => 5,
            TransferStatus::QueuedForUpload => 6,
            TransferStatus::PreparingUpload => 7,
            TransferStatus::Uploading => 8,
            TransferStatus::UploadFailed => 9,
            TransferStatus::UploadForcedStart => 10,
            TransferStatus::Done => 11,
            TransferStatus::Suspended => 12,
            TransferStatus::Cancelled => 13,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        let status = match code {
            0 => TransferStatus::Normal,
            1 => TransferStatus::Hidden,
            2 => TransferStatus::QueuedForDownload,
            3 => TransferStatus::PreparingDownload,
            4 => TransferStatus::Downloading,
            5 => TransferStatus::DownloadFailed,
            6 => TransferStatus::QueuedForUpload,
            7 => TransferStatus::PreparingUpload,
            8 => TransferStatus::Uploading,
            9 => TransferStatus::UploadFailed,
            10 => TransferStatus::UploadForcedStart,
            11 => TransferStatus::Done,
            12 => TransferStatus::Suspended,
            13 => TransferStatus::Cancelled,
            _ => return None,
        };
        Some(status)
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
