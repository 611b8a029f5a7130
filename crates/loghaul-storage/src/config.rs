//! Storage Configuration
//!
//! ## WriterConfig
//!
//! Controls where segments live and when they roll:
//!
//! - **base_dir**: root directory; stream `orders` is written to `<base_dir>/orders/orders.log`
//! - **max_file_size**: rotate once a segment reaches this many bytes (default: 2 GiB)
//! - **max_backup_name_attempts**: how many one-second steps rotation waits for a free backup
//!   name before giving up (default: 10)
//! - **rotate_at**: UTC wall-clock time of the daily rotation (default: 00:00:00)
//! - **flush_interval_ms**: how often buffered bytes are pushed to the live segment so readers
//!   can see them (default: 1000, 0 disables the background flush)
//!
//! ## Usage
//!
//! ```ignore
//! use loghaul_storage::WriterConfig;
//!
//! let config = WriterConfig {
//!     base_dir: "/var/lib/loghaul".into(),
//!     max_file_size: 512 * 1024 * 1024,
//!     ..Default::default()
//! };
//! ```

use std::path::PathBuf;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Maximum segment size in bytes before rotating
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_max_backup_name_attempts")]
    pub max_backup_name_attempts: u32,

    #[serde(default = "default_rotate_at")]
    pub rotate_at: NaiveTime,

    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            max_file_size: default_max_file_size(),
            max_backup_name_attempts: default_max_backup_name_attempts(),
            rotate_at: default_rotate_at(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl WriterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(StorageError::InvalidMaxSize);
        }
        Ok(())
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("data/log/")
}

fn default_max_file_size() -> u64 {
    2048 * 1024 * 1024 // 2GB
}

fn default_max_backup_name_attempts() -> u32 {
    10
}

fn default_rotate_at() -> NaiveTime {
    NaiveTime::default()
}

fn default_flush_interval_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WriterConfig::default();
        assert_eq!(config.max_file_size, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.max_backup_name_attempts, 10);
        assert_eq!(config.rotate_at, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_size_rejected() {
        let config = WriterConfig {
            max_file_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(StorageError::InvalidMaxSize)));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: WriterConfig =
            serde_json::from_str(r#"{"base_dir":"/tmp/logs","rotate_at":"03:30:00"}"#).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/tmp/logs"));
        assert_eq!(config.rotate_at, NaiveTime::from_hms_opt(3, 30, 0).unwrap());
        assert_eq!(config.max_file_size, default_max_file_size());
    }
}
