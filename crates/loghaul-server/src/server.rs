//! Ingest server
//!
//! TCP listener that hands every accepted connection to its own [`Handler`] task.
//!
//! There is no connection cap. Handler tasks are tracked so that a shutdown can close every
//! open connection and wait for the bytes already read to reach their writers.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn, Instrument};

use loghaul_storage::WriterRegistry;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::handler::Handler;

/// Ingest server
pub struct Server {
    config: ServerConfig,
    registry: Arc<WriterRegistry>,
}

impl Server {
    pub fn new(config: ServerConfig, registry: Arc<WriterRegistry>) -> Self {
        Self { config, registry }
    }

    /// Bind and serve until accepting fails.
    pub async fn run(self) -> Result<()> {
        Self::bind(self.config, self.registry).await?.run().await
    }

    /// Bind the listen address without accepting yet.
    pub async fn bind(config: ServerConfig, registry: Arc<WriterRegistry>) -> Result<BoundServer> {
        let addr = config.socket_addr()?;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        // accepted sockets inherit the listener's receive buffer
        if let Err(e) = socket.set_recv_buffer_size(config.recv_buffer_size) {
            warn!(size = config.recv_buffer_size, error = %e, "Failed to set receive buffer size");
        }
        socket.bind(addr)?;
        let listener = socket.listen(1024)?;

        let local_addr = listener.local_addr()?;
        info!("Log server listening on {}", local_addr);

        Ok(BoundServer {
            listener,
            registry,
            connections: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        })
    }
}

/// Server that has been bound to a port
pub struct BoundServer {
    listener: TcpListener,
    registry: Arc<WriterRegistry>,
    connections: TaskTracker,
    shutdown: CancellationToken,
}

impl BoundServer {
    /// Accept connections until accepting fails; the accept error is returned.
    pub async fn run(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => self.spawn_handler(stream, addr),
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    return Err(ServerError::Io(e));
                }
            }
        }
    }

    /// Like [`run`](Self::run), but also stops cleanly when `shutdown` fires.
    ///
    /// On shutdown every open connection is closed, and this returns once their handlers
    /// have handed the bytes they already read to the writers.
    pub async fn run_until(self, shutdown: oneshot::Receiver<()>) -> Result<()> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.spawn_handler(stream, addr),
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            return Err(ServerError::Io(e));
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!(
                        connections = self.connections.len(),
                        "Log server shutting down"
                    );
                    break;
                }
            }
        }

        self.shutdown.cancel();
        self.connections.close();
        self.connections.wait().await;
        debug!("All connections closed");

        Ok(())
    }

    /// Get the local address the server is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(ServerError::from)
    }

    pub fn registry(&self) -> &Arc<WriterRegistry> {
        &self.registry
    }

    fn spawn_handler(&self, stream: TcpStream, addr: SocketAddr) {
        let handler = Handler::new(Arc::clone(&self.registry), addr, self.shutdown.child_token());
        let span = handler.span().clone();

        self.connections.spawn(
            async move {
                match handler.run(stream).await {
                    Ok(bytes) => debug!(bytes, "Connection closed"),
                    Err(ServerError::Protocol(e)) => debug!(error = %e, "Bad handshake"),
                    Err(ServerError::InvalidName(_)) => warn!("Rejected invalid stream name"),
                    Err(e) => warn!(error = %e, "Connection error"),
                }
            }
            .instrument(span),
        );
    }
}
