//! Server Configuration
//!
//! ```ignore
//! let config = ServerConfig {
//!     bind_addr: "0.0.0.0:4560".to_string(),
//!     writer: WriterConfig {
//!         base_dir: "/var/lib/loghaul".into(),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use loghaul_storage::WriterConfig;

use crate::error::{Result, ServerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on, `host:port`
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Kernel receive buffer requested for the listening socket
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: u32,

    #[serde(default)]
    pub writer: WriterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            recv_buffer_size: default_recv_buffer_size(),
            writer: WriterConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Check everything that would otherwise fail at bind or first write.
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        self.writer
            .validate()
            .map_err(|e| ServerError::InvalidConfig(e.to_string()))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr.parse().map_err(|e| {
            ServerError::InvalidConfig(format!("bind address {:?}: {}", self.bind_addr, e))
        })
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:4560".to_string()
}

fn default_recv_buffer_size() -> u32 {
    1024 * 1024 // 1MB
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr().unwrap().port(), 4560);
        assert_eq!(config.recv_buffer_size, 1 << 20);
    }

    #[test]
    fn test_bad_bind_addr() {
        let config = ServerConfig {
            bind_addr: ":4560".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ServerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_segment_size() {
        let mut config = ServerConfig::default();
        config.writer.max_file_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max segment size"), "{err}");
    }
}
