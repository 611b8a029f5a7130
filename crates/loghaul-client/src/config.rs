//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where to ship logs and how.
///
/// # Fields
///
/// * `name` - Stream name announced in the handshake
/// * `remote_addr` - `host:port` of the loghaul server
/// * `compression` - Negotiate LZ4 framing after the handshake (default: false)
/// * `flush_interval` - Async client drain period (default: 500ms)
/// * `reconnect_cool_down` - Minimum gap between connection attempts (default: 1s)
/// * `connect_timeout` - Upper bound on a single TCP connect (default: 5s)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub name: String,

    pub remote_addr: String,

    #[serde(default)]
    pub compression: bool,

    #[serde(default = "default_flush_interval")]
    pub flush_interval: Duration,

    #[serde(default = "default_reconnect_cool_down")]
    pub reconnect_cool_down: Duration,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(name: impl Into<String>, remote_addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote_addr: remote_addr.into(),
            compression: false,
            flush_interval: default_flush_interval(),
            reconnect_cool_down: default_reconnect_cool_down(),
            connect_timeout: default_connect_timeout(),
        }
    }

    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_reconnect_cool_down(mut self, cool_down: Duration) -> Self {
        self.reconnect_cool_down = cool_down;
        self
    }
}

fn default_flush_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_reconnect_cool_down() -> Duration {
    Duration::from_secs(1)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}
