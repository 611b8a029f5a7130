//! Finder Error Types
//!
//! ## Error Categories
//!
//! ### Lookup Results
//! - `NotFound`: no segment covers the identifier, or the covering segment lacks the record
//!
//! ### Input Errors
//! - `InvalidIdentifier`: the id is not a well-formed xid
//! - `InvalidStreamName`: the name would escape the base directory
//!
//! ### Storage Errors
//! - `Io`: a local segment could not be listed, opened or read
//! - `Remote`: the archive store failed to list or fetch
//! - `ListTimeout`: the archive listing did not finish in time
//! - `Join`: the blocking scan task panicked or was cancelled

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FinderError>;

#[derive(Debug, Error)]
pub enum FinderError {
    #[error("record not found")]
    NotFound,

    #[error("{0}")]
    InvalidIdentifier(#[source] loghaul_core::Error),

    #[error("Invalid stream name: {0:?}")]
    InvalidStreamName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive store error: {0}")]
    Remote(#[from] object_store::Error),

    #[error("listing {dir} timed out after {timeout:?}")]
    ListTimeout { dir: String, timeout: Duration },

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
