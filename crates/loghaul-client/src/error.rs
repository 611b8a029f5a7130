//! Error types for loghaul client operations.
//!
//! ## Error Handling Strategy
//!
//! - **Transient errors**: `Connect`, `ConnectTimeout`, `Io`, `ReconnectBackoff`. The
//!   connection is dropped and the next batch tries again once the cool-down has passed.
//! - **Server errors**: `Rejected`. The server refused the stream name; retrying with the same
//!   configuration will keep failing.
//! - **Protocol errors**: `Codec`. The handshake could not be encoded or the reply was garbage.
//!
//! The sync client returns these from `send` (and as `std::io::Error` through its `Write` impl).
//! The async client hands them to the failure callback and drops the batch.
//!
//! ## Examples
//!
//! ```ignore
//! use loghaul_client::{ClientError, SyncLogClient};
//!
//! match client.send(b"line\n") {
//!     Ok(n) => println!("sent {n} bytes"),
//!     Err(ClientError::ReconnectBackoff { remaining }) => {
//!         eprintln!("server unreachable, retry in {remaining:?}");
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

/// Convenience type alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connect to the server failed.
    ///
    /// ## Causes
    /// - Server is down or restarting
    /// - Wrong `remote_addr`
    /// - Firewall blocking the port
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// TCP connect did not complete within `connect_timeout`.
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// Socket read or write failed after the connection was established.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Handshake encoding or decoding failed.
    #[error("handshake failed: {0}")]
    Codec(#[from] loghaul_core::Error),

    /// The server answered the handshake with `Success: false`.
    ///
    /// ## Causes
    /// - Stream name contains characters outside `[0-9A-Za-z_-]`
    #[error("server return error, {0}")]
    Rejected(String),

    /// A reconnect was attempted within the cool-down after the previous attempt.
    ///
    /// The batch is dropped; nothing is queued for later.
    #[error("reconnect refused, retry in {remaining:?}")]
    ReconnectBackoff { remaining: Duration },
}

impl From<ClientError> for std::io::Error {
    fn from(err: ClientError) -> Self {
        use std::io::ErrorKind;

        match err {
            ClientError::Io(e) => e,
            ClientError::Connect { source, .. } => source,
            ClientError::ConnectTimeout { .. } => std::io::Error::new(ErrorKind::TimedOut, err),
            ClientError::ReconnectBackoff { .. } => {
                std::io::Error::new(ErrorKind::WouldBlock, err)
            }
            ClientError::Rejected(_) => std::io::Error::new(ErrorKind::PermissionDenied, err),
            ClientError::Codec(_) => std::io::Error::new(ErrorKind::InvalidData, err),
        }
    }
}
