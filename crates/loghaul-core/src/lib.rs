//! loghaul core types
//!
//! Everything both ends of a log stream have to agree on lives here:
//!
//! - [`codec`]: the handshake framing (`"CL"` marker, `u16` little-endian length, JSON payload)
//! - [`name`]: the stream name rule enforced by the server and the finder
//! - [`identifier`]: the time-sortable record identifier (xid) and its embedded timestamp
//! - [`archive`]: the rotated segment naming convention (`<name>-YYYYMMDD_HHMMSS.log`)
//!
//! The writer side produces archive names with [`archive::backup_file_name`] and the finder
//! side parses them back with [`archive::ArchiveFile::parse`], so the two can never drift.

pub mod archive;
pub mod codec;
pub mod error;
pub mod identifier;
pub mod name;

pub use archive::ArchiveFile;
pub use codec::{ConnectRequest, ConnectResponse};
pub use error::{Error, Result};
pub use identifier::Identifier;
pub use name::{is_valid_stream_name, validate_stream_name};
