//! Finder Configuration
//!
//! - **base_dir**: the same storage root the server writes to
//! - **bind_addr**: HTTP listen address of the lookup service (default: 0.0.0.0:4565)
//! - **list_timeout_secs**: bound on one archive listing (default: 10)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinderConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_list_timeout_secs")]
    pub list_timeout_secs: u64,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            bind_addr: default_bind_addr(),
            list_timeout_secs: default_list_timeout_secs(),
        }
    }
}

impl FinderConfig {
    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("data/log/")
}

fn default_bind_addr() -> String {
    "0.0.0.0:4565".to_string()
}

fn default_list_timeout_secs() -> u64 {
    10
}
