//! Connection Handler
//!
//! One handler per accepted connection:
//!
//! ```text
//!   client                          handler
//!     |  "CL" | len | {Name,...}  ->  read + validate name
//!     |  <- len | {Success,Status}    reply
//!     |                               get_or_create(name) writer
//!     |  raw bytes (maybe LZ4)    ->  copy 1MB chunks into writer
//!     |  EOF / error                  done, writer stays open
//! ```
//!
//! The handshake runs on the async socket. The body copy moves the socket back to blocking
//! mode and runs on a thread of its own, since both the LZ4 frame decoder and the rotating
//! writer are blocking I/O and a connection may stay open for days. The blocking pool stays
//! free for registry maintenance. Every failure ends this connection only.
//!
//! When the shutdown token fires, the handler shuts the socket down, which ends the blocked
//! read, and waits for the copy thread to hand its result back.

use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;

use lz4_flex::frame::FrameDecoder;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use loghaul_core::codec::{
    encode_connect_response, read_connect_request_async, ConnectResponse, STATUS_INVALID_NAME,
};
use loghaul_core::is_valid_stream_name;
use loghaul_storage::{RotatingWriter, WriterRegistry};

use crate::error::{Result, ServerError};

/// Size of the chunks read from the socket and handed to the writer.
pub const COPY_BUFFER_SIZE: usize = 1024 * 1024;

pub struct Handler {
    registry: Arc<WriterRegistry>,
    shutdown: CancellationToken,
    span: Span,
}

impl Handler {
    pub fn new(
        registry: Arc<WriterRegistry>,
        peer: SocketAddr,
        shutdown: CancellationToken,
    ) -> Self {
        let span = tracing::info_span!("connection", peer = %peer, name = tracing::field::Empty);
        Self {
            registry,
            shutdown,
            span,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Serve one connection to completion; returns the number of body bytes stored.
    ///
    /// A malformed handshake gets no reply. An invalid name gets a failure reply and nothing
    /// after it is read.
    pub async fn run(self, mut stream: TcpStream) -> Result<u64> {
        let request = tokio::select! {
            request = read_connect_request_async(&mut stream) => request?,
            _ = self.shutdown.cancelled() => return Ok(0),
        };
        self.span.record("name", request.name.as_str());

        if !is_valid_stream_name(&request.name) {
            reply(&mut stream, &ConnectResponse::rejected(STATUS_INVALID_NAME)).await?;
            let _ = stream.shutdown().await;
            return Err(ServerError::InvalidName(request.name));
        }
        reply(&mut stream, &ConnectResponse::ok()).await?;

        let writer = self.registry.get_or_create(&request.name).await?;
        tracing::debug!(compression = request.compression, "Handshake accepted");

        let socket = stream.into_std()?;
        socket.set_nonblocking(false)?;
        let control = socket.try_clone()?;

        let (done_tx, mut done_rx) = oneshot::channel();
        let span = self.span.clone();
        let compression = request.compression;
        std::thread::Builder::new()
            .name(format!("loghaul-copy-{}", request.name))
            .spawn(move || {
                let _entered = span.enter();
                let source: Box<dyn Read + Send> = if compression {
                    Box::new(FrameDecoder::new(socket))
                } else {
                    Box::new(socket)
                };
                let _ = done_tx.send(copy_into(source, &writer));
            })?;

        tokio::select! {
            result = &mut done_rx => return result.map_err(|_| ServerError::CopyAborted)?,
            _ = self.shutdown.cancelled() => {
                tracing::debug!("Closing connection for shutdown");
                if let Err(e) = control.shutdown(Shutdown::Both) {
                    tracing::debug!(error = %e, "Socket already closed");
                }
            }
        }

        done_rx.await.map_err(|_| ServerError::CopyAborted)?
    }
}

async fn reply(stream: &mut TcpStream, response: &ConnectResponse) -> Result<()> {
    let frame = encode_connect_response(response)?;
    stream.write_all(&frame).await?;
    Ok(())
}

/// Copy `source` into `writer` until end of stream.
///
/// A read error or a short write stops the copy; whatever was stored before stays stored.
pub fn copy_into<R: Read>(mut source: R, writer: &RotatingWriter) -> Result<u64> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ServerError::Io(e)),
        };

        let written = writer.write(&buf[..n])?;
        if written != n {
            return Err(ServerError::ShortWrite {
                written,
                expected: n,
            });
        }
        total += n as u64;
    }

    tracing::trace!(bytes = total, "Body copied");
    Ok(total)
}
