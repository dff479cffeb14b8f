use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::TransferId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Download,
    Upload,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Download => "download",
            Direction::Upload => "upload",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "download" => Some(Direction::Download),
            "upload" => Some(Direction::Upload),
            _ => None,
        }
    }
}

/// Network class of the session carrying a transfer. Each class gets its own
/// host limits so a constrained link cannot starve an unconstrained one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkClass {
    #[default]
    Foreground,
    Background,
    /// Metered/cellular link.
    Cellular,
}

impl NetworkClass {
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkClass::Foreground => "foreground",
            NetworkClass::Background => "background",
            NetworkClass::Cellular => "cellular",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "foreground" => Some(NetworkClass::Foreground),
            "background" => Some(NetworkClass::Background),
            "cellular" => Some(NetworkClass::Cellular),
            _ => None,
        }
    }
}

/// What a caller submits to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Caller-chosen id; resubmitting the same id is a no-op.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TransferId>,
    pub account: String,
    /// Base URL of the server, e.g. `https://cloud.example.com`.
    pub server_url: String,
    pub direction: Direction,
    pub remote_path: String,
    pub local_path: PathBuf,
    /// Byte length if known up front (0 = unknown).
    #[serde(default)]
    pub expected_size: u64,
    #[serde(default)]
    pub network: NetworkClass,
    #[serde(default)]
    pub forced: bool,
}

impl TransferRequest {
    pub fn download(
        account: impl Into<String>,
        server_url: impl Into<String>,
        remote_path: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self::new(Direction::Download, account, server_url, remote_path, local_path)
    }

    pub fn upload(
        account: impl Into<String>,
        server_url: impl Into<String>,
        remote_path: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self::new(Direction::Upload, account, server_url, remote_path, local_path)
    }

    fn new(
        direction: Direction,
        account: impl Into<String>,
        server_url: impl Into<String>,
        remote_path: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: None,
            account: account.into(),
            server_url: server_url.into(),
            direction,
            remote_path: remote_path.into(),
            local_path: local_path.into(),
            expected_size: 0,
            network: NetworkClass::default(),
            forced: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<TransferId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_expected_size(mut self, bytes: u64) -> Self {
        self.expected_size = bytes;
        self
    }

    pub fn on_network(mut self, network: NetworkClass) -> Self {
        self.network = network;
        self
    }

    /// Bypass the normal queue order.
    pub fn forced(mut self) -> Self {
        self.forced = true;
        self
    }
}
