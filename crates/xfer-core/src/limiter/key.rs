use anyhow::{Context, Result};

use crate::record::{Direction, NetworkClass};

/// Origin of a server URL.
///
/// URLs are normalised down to `(scheme, host, port)` so that different paths
/// on the same server share one concurrency budget.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct HostKey {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl HostKey {
    /// String form used in snapshots and logs: "scheme:host:port".
    pub fn to_string_key(&self) -> String {
        format!("{}:{}:{}", self.scheme, self.host, self.port)
    }

    /// Construct a host key from a URL string.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url).with_context(|| format!("invalid server URL: {url}"))?;

        let scheme = parsed.scheme().to_string();
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("server URL has no host: {url}"))?
            .to_ascii_lowercase();
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| anyhow::anyhow!("server URL has no port and no known default: {url}"))?;

        Ok(Self { scheme, host, port })
    }
}

/// Unit of concurrency accounting: one counter per account, server origin,
/// direction and network class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimiterKey {
    pub account: String,
    pub host: HostKey,
    pub direction: Direction,
    pub network: NetworkClass,
}

impl std::fmt::Display for LimiterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}/{}/{}",
            self.account,
            self.host.to_string_key(),
            self.direction.as_str(),
            self.network.as_str()
        )
    }
}
