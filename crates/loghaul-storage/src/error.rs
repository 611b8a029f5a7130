//! Storage Error Types
//!
//! ## Error Categories
//!
//! ### Filesystem Errors
//! - `Io`: creating the stream directory, opening, writing or flushing a segment failed
//!
//! ### Rotation Errors
//! - `Rotation`: the live segment could not be renamed to its backup name
//! - `BackupNameExhausted`: every candidate backup name was already taken
//!
//! ### Configuration Errors
//! - `InvalidMaxSize`: a writer was configured with a zero segment size
//! - `InvalidStreamName`: the registry refused a name that would escape the base directory
//!
//! ### Runtime Errors
//! - `Join`: a blocking rotation task panicked or was cancelled
//!
//! A failed rotation always leaves the data at the live path and the writer closed, so the
//! next write reopens and appends to the same file.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rotate {from} -> {to}: {source}")]
    Rotation {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no free backup name for {path} after {attempts} attempts")]
    BackupNameExhausted { path: PathBuf, attempts: u32 },

    #[error("max segment size must be greater than zero")]
    InvalidMaxSize,

    #[error("Invalid stream name: {0:?}")]
    InvalidStreamName(String),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
