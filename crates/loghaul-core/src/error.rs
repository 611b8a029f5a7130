//! Error Types for loghaul core
//!
//! ## Error Categories
//!
//! ### Framing Errors
//! - `Io`: the stream ended or failed before a full length prefix / marker was read
//! - `TruncatedFrame`: the length prefix promised more bytes than the stream delivered
//! - `InvalidMarker`: a handshake request did not start with the `"CL"` marker
//!
//! ### Encoding Errors
//! - `PayloadTooLarge`: serialized payload does not fit the `u16` length prefix
//! - `Serialize`: the payload could not be serialized at all
//!
//! ### Decoding Errors
//! - `Parse`: the payload was not a valid message; the raw text is kept for diagnostics
//!
//! ### Validation Errors
//! - `InvalidStreamName`: name outside `[0-9A-Za-z_-]+`
//! - `InvalidIdentifier`: identifier is not a well-formed xid

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("read message with length {length}: {source}")]
    TruncatedFrame {
        length: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid handshake marker: {0:?}")]
    InvalidMarker([u8; 2]),

    #[error("Payload too large: {0} bytes (max 65535)")]
    PayloadTooLarge(usize),

    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("parse message failed, {raw}: {source}")]
    Parse {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid stream name: {0:?}")]
    InvalidStreamName(String),

    #[error("Invalid identifier {id:?}: {reason}")]
    InvalidIdentifier { id: String, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
