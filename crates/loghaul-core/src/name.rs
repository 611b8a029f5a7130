//! Stream name validation
//!
//! A stream name becomes a file name on the server and an object prefix in remote storage,
//! so it is restricted to `[0-9A-Za-z_-]+`. Path separators, dots and anything else that
//! could escape the base directory are refused.

use crate::error::{Error, Result};

/// Returns `true` when `name` is non-empty and only contains ASCII letters, digits, `_` or `-`.
pub fn is_valid_stream_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

pub fn validate_stream_name(name: &str) -> Result<()> {
    if is_valid_stream_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidStreamName(name.to_string()))
    }
}
