//! Non-blocking log client.
//!
//! `write` only appends to an [`AccumulationBuffer`] and always reports the full length. A
//! background task drains the buffer every `flush_interval` and ships the batch over one
//! persistent connection.
//!
//! ## Delivery
//!
//! At-most-once and best-effort. When a batch cannot be delivered (connect failure, rejected
//! handshake, write error, or a reconnect refused during the cool-down) the failure callback
//! is invoked with the error and the batch is discarded.
//!
//! ## Shipping tracing output
//!
//! ```ignore
//! let client = AsyncLogClient::new("orders-api", "logs:4560", |e| eprintln!("log shipping: {e}"));
//! tracing_subscriber::fmt().json().with_writer(client.writer()).init();
//! ```

use std::io;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::Instrument;
use tracing_subscriber::fmt::MakeWriter;

use crate::backoff::ReconnectGate;
use crate::buffer::{AccumulationBuffer, BufferPool};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::transport::AsyncTransport;

/// Called with every delivery failure. Runs on the sender task, so keep it short.
pub type FailureCallback = Arc<dyn Fn(&ClientError) + Send + Sync>;

pub struct AsyncLogClient {
    buffer: Arc<AccumulationBuffer>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AsyncLogClient {
    /// Client with LZ4 compression and default intervals.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<F>(name: &str, remote_addr: &str, on_failure: F) -> Self
    where
        F: Fn(&ClientError) + Send + Sync + 'static,
    {
        Self::with_config(
            ClientConfig::new(name, remote_addr).with_compression(true),
            on_failure,
        )
    }

    pub fn with_config<F>(config: ClientConfig, on_failure: F) -> Self
    where
        F: Fn(&ClientError) + Send + Sync + 'static,
    {
        let buffer = Arc::new(AccumulationBuffer::new(BufferPool::default()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let span = tracing::debug_span!("log_client", name = %config.name);
        let sender = Sender {
            gate: ReconnectGate::new(config.reconnect_cool_down),
            config,
            buffer: Arc::clone(&buffer),
            on_failure: Arc::new(on_failure),
            transport: None,
        };
        let task = tokio::spawn(sender.run(shutdown_rx).instrument(span));

        Self {
            buffer,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Append `data` to the pending batch. Never blocks on I/O.
    pub fn write(&self, data: &[u8]) -> usize {
        self.buffer.write(data);
        data.len()
    }

    /// Bytes waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// A cheap handle that writes into this client's buffer, usable as a `MakeWriter`.
    pub fn writer(&self) -> AsyncLogWriter {
        AsyncLogWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }

    /// Stop the background task and wait for it. Pending bytes are not drained.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Log client task ended abnormally");
            }
        }
    }
}

impl Drop for AsyncLogClient {
    fn drop(&mut self) {
        // dropping the sender half wakes the task, which then exits
        self.shutdown.take();
    }
}

impl io::Write for AsyncLogClient {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(AsyncLogClient::write(self, buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for AsyncLogClient {
    type Writer = AsyncLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer()
    }
}

/// Writer half of an [`AsyncLogClient`].
#[derive(Clone)]
pub struct AsyncLogWriter {
    buffer: Arc<AccumulationBuffer>,
}

impl io::Write for AsyncLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for AsyncLogWriter {
    type Writer = AsyncLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

struct Sender {
    config: ClientConfig,
    buffer: Arc<AccumulationBuffer>,
    on_failure: FailureCallback,
    transport: Option<AsyncTransport>,
    gate: ReconnectGate,
}

impl Sender {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let Some(batch) = self.buffer.get_and_clear() else {
                        continue;
                    };
                    if let Err(e) = self.deliver(&batch).await {
                        tracing::debug!(error = %e, dropped = batch.len(), "Batch dropped");
                        (self.on_failure)(&e);
                    }
                }
            }
        }

        if let Some(transport) = self.transport.take() {
            let _ = transport.shutdown().await;
        }
        tracing::debug!("Log client stopped");
    }

    async fn deliver(&mut self, batch: &[u8]) -> Result<()> {
        let transport = match self.transport.take() {
            Some(transport) => self.transport.insert(transport),
            None => {
                self.gate
                    .try_acquire()
                    .map_err(|remaining| ClientError::ReconnectBackoff { remaining })?;
                let transport = AsyncTransport::connect(&self.config).await?;
                self.transport.insert(transport)
            }
        };

        if let Err(e) = transport.send(batch).await {
            self.transport = None;
            return Err(ClientError::Io(e));
        }

        tracing::trace!(size = batch.len(), "Batch sent");
        Ok(())
    }
}
