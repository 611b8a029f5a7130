//! loghaul Client Library
//!
//! Ship raw log bytes to a loghaul server. Callers see a plain byte sink; connecting,
//! handshaking, compression and reconnecting all happen behind it.
//!
//! ## Clients
//!
//! - [`AsyncLogClient`]: `write` appends to an in-memory buffer and returns immediately; a
//!   tokio task ships the buffer every 500ms. Failures go to a callback. Use it for
//!   application logging, including as a `tracing_subscriber` writer.
//! - [`SyncLogClient`]: `write` connects (if needed) and sends inline, returning errors to the
//!   caller. Use it for pipes and batch tools.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::io::Write;
//! use loghaul_client::{ClientConfig, SyncLogClient};
//!
//! let mut client = SyncLogClient::new(ClientConfig::new("orders", "127.0.0.1:4560"));
//! client.write_all(b"{\"level\":\"info\",\"msg\":\"order placed\"}\n")?;
//! client.close()?;
//! ```
//!
//! ## Reconnects
//!
//! Both clients drop the connection on any error and refuse to reconnect until the cool-down
//! (1s) since the previous attempt has passed. Data offered during the cool-down is dropped.

pub mod async_client;
pub mod backoff;
pub mod buffer;
pub mod config;
pub mod error;
pub mod sync_client;
pub mod transport;

pub use async_client::{AsyncLogClient, AsyncLogWriter, FailureCallback};
pub use backoff::ReconnectGate;
pub use buffer::{AccumulationBuffer, BufferPool, PooledBuffer};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use sync_client::SyncLogClient;
pub use transport::{AsyncTransport, Transport};
