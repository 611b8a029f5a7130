//! Server Error Types
//!
//! ## Error Categories
//!
//! ### Connection Errors
//! These end one connection and never the server:
//! - `Protocol`: the handshake was malformed (bad marker, truncated frame, invalid JSON)
//! - `InvalidName`: the handshake named a stream outside `[0-9A-Za-z_-]+`
//! - `ShortWrite`: the writer accepted fewer bytes than it was given
//! - `Storage`: the stream's writer could not be created or failed to write
//! - `CopyAborted`: the body copy thread died before reporting
//!
//! ### Listener Errors
//! - `Io`: binding the listen address or accepting a connection failed
//!
//! ### Startup Errors
//! - `InvalidConfig`: the server configuration is unusable

use thiserror::Error;

use loghaul_storage::StorageError;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] loghaul_core::Error),

    #[error("Invalid stream name: {0:?}")]
    InvalidName(String),

    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("copy thread exited without a result")]
    CopyAborted,
}
