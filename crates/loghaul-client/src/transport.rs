//! Connection setup and the post-handshake byte stream.
//!
//! Both clients connect the same way: TCP connect (bounded by `connect_timeout`), send the
//! `"CL"` handshake, read the reply, and on success wrap the socket in a transport chosen once
//! from the negotiated compression flag. Every batch is written and then flushed, so with LZ4
//! the server sees complete blocks after each batch instead of waiting for a frame to fill.

use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};

use lz4_flex::frame::FrameEncoder;
use tokio::io::AsyncWriteExt;

use loghaul_core::codec::{
    encode_connect_request, read_connect_response, read_connect_response_async, ConnectRequest,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Blocking byte stream to the server.
pub enum Transport {
    Plain(TcpStream),
    Lz4(FrameEncoder<TcpStream>),
}

impl Transport {
    /// Connect, perform the handshake and return the ready stream.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let mut stream = connect_tcp(config)?;
        let _ = stream.set_nodelay(true);

        let request = encode_connect_request(&ConnectRequest::new(&config.name, config.compression))?;
        stream.write_all(&request)?;

        let response = read_connect_response(&mut stream)?;
        if !response.success {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            return Err(ClientError::Rejected(response.status));
        }

        tracing::debug!(
            name = %config.name,
            addr = %config.remote_addr,
            compression = config.compression,
            "Connected"
        );

        Ok(if config.compression {
            Transport::Lz4(FrameEncoder::new(stream))
        } else {
            Transport::Plain(stream)
        })
    }

    /// Write one batch and flush it to the socket.
    pub fn send(&mut self, batch: &[u8]) -> io::Result<()> {
        match self {
            Transport::Plain(stream) => {
                stream.write_all(batch)?;
                stream.flush()
            }
            Transport::Lz4(encoder) => {
                encoder.write_all(batch)?;
                encoder.flush()
            }
        }
    }

    /// Terminate the LZ4 frame (if any) and close the socket.
    pub fn shutdown(self) -> io::Result<()> {
        let stream = match self {
            Transport::Plain(stream) => stream,
            Transport::Lz4(encoder) => encoder.finish().map_err(io::Error::other)?,
        };
        stream.shutdown(std::net::Shutdown::Both)
    }
}

fn connect_tcp(config: &ClientConfig) -> Result<TcpStream> {
    let connect_err = |source| ClientError::Connect {
        addr: config.remote_addr.clone(),
        source,
    };

    let mut last_err = None;
    for addr in config.remote_addr.to_socket_addrs().map_err(connect_err)? {
        match TcpStream::connect_timeout(&addr, config.connect_timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                last_err = Some(ClientError::ConnectTimeout {
                    addr: config.remote_addr.clone(),
                    timeout: config.connect_timeout,
                });
            }
            Err(e) => last_err = Some(connect_err(e)),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        connect_err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "address resolved to nothing",
        ))
    }))
}

/// Async byte stream to the server.
///
/// LZ4 framing is synchronous, so compressed batches are encoded into an in-memory buffer and
/// the resulting bytes are written to the socket.
pub enum AsyncTransport {
    Plain(tokio::net::TcpStream),
    Lz4 {
        stream: tokio::net::TcpStream,
        encoder: FrameEncoder<Vec<u8>>,
    },
}

impl AsyncTransport {
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let mut stream = tokio::time::timeout(
            config.connect_timeout,
            tokio::net::TcpStream::connect(config.remote_addr.as_str()),
        )
        .await
        .map_err(|_| ClientError::ConnectTimeout {
            addr: config.remote_addr.clone(),
            timeout: config.connect_timeout,
        })?
        .map_err(|source| ClientError::Connect {
            addr: config.remote_addr.clone(),
            source,
        })?;
        let _ = stream.set_nodelay(true);

        let request = encode_connect_request(&ConnectRequest::new(&config.name, config.compression))?;
        stream.write_all(&request).await?;

        let response = read_connect_response_async(&mut stream).await?;
        if !response.success {
            let _ = stream.shutdown().await;
            return Err(ClientError::Rejected(response.status));
        }

        tracing::debug!(
            name = %config.name,
            addr = %config.remote_addr,
            compression = config.compression,
            "Connected"
        );

        Ok(if config.compression {
            AsyncTransport::Lz4 {
                stream,
                encoder: FrameEncoder::new(Vec::new()),
            }
        } else {
            AsyncTransport::Plain(stream)
        })
    }

    pub async fn send(&mut self, batch: &[u8]) -> io::Result<()> {
        match self {
            AsyncTransport::Plain(stream) => {
                stream.write_all(batch).await?;
                stream.flush().await
            }
            AsyncTransport::Lz4 { stream, encoder } => {
                encoder.write_all(batch)?;
                encoder.flush()?;
                let compressed = std::mem::take(encoder.get_mut());
                stream.write_all(&compressed).await?;
                stream.flush().await
            }
        }
    }

    pub async fn shutdown(self) -> io::Result<()> {
        let mut stream = match self {
            AsyncTransport::Plain(stream) => stream,
            AsyncTransport::Lz4 {
                mut stream,
                encoder,
            } => {
                let tail = encoder.finish().map_err(io::Error::other)?;
                stream.write_all(&tail).await?;
                stream
            }
        };
        stream.shutdown().await
    }
}
