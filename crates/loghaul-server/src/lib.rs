//! loghaul Ingest Server
//!
//! Accepts long-lived TCP connections from log clients and appends each stream's bytes to a
//! rotated file under the base directory.
//!
//! ## Connection Lifecycle
//!
//! 1. Client sends the `"CL"` handshake naming a stream and whether the body is LZ4 framed
//! 2. Server replies `{"Success":true,"Status":"OK"}` or rejects a bad name and hangs up
//! 3. Everything after the reply is copied verbatim into `<base_dir>/<name>/<name>.log`
//!
//! Connections for the same name share one writer; see [`loghaul_storage::WriterRegistry`].
//!
//! ## Usage
//!
//! ```ignore
//! let registry = Arc::new(WriterRegistry::new(config.writer.clone(), Arc::new(SystemClock))?);
//! let server = Server::bind(config, registry).await?;
//! println!("listening on {}", server.local_addr()?);
//! server.run_until(shutdown_rx).await?;
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod server;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use handler::Handler;
pub use server::{BoundServer, Server};
