//! Blocking log client.
//!
//! Every `send` runs inline under one mutex: connect and handshake when there is no
//! connection, then write and flush. Failures are returned to the caller and drop the
//! connection; the next call reconnects once the cool-down has passed.

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backoff::ReconnectGate;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::transport::Transport;

struct Connection {
    transport: Option<Transport>,
    gate: ReconnectGate,
}

pub struct SyncLogClient {
    config: ClientConfig,
    conn: Mutex<Connection>,
}

impl SyncLogClient {
    pub fn new(config: ClientConfig) -> Self {
        let gate = ReconnectGate::new(config.reconnect_cool_down);
        Self {
            config,
            conn: Mutex::new(Connection {
                transport: None,
                gate,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.conn().transport.is_some()
    }

    /// Deliver `data`, connecting first if needed. Returns `data.len()` on success.
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        let mut conn = self.conn();

        let transport = match conn.transport.take() {
            Some(transport) => conn.transport.insert(transport),
            None => {
                conn.gate
                    .try_acquire()
                    .map_err(|remaining| ClientError::ReconnectBackoff { remaining })?;
                let transport = Transport::connect(&self.config)?;
                conn.transport.insert(transport)
            }
        };

        if let Err(e) = transport.send(data) {
            tracing::warn!(
                name = %self.config.name,
                error = %e,
                "Write failed, dropping connection"
            );
            conn.transport = None;
            return Err(ClientError::Io(e));
        }

        Ok(data.len())
    }

    /// Close the connection. A later `send` reconnects.
    pub fn close(&self) -> Result<()> {
        if let Some(transport) = self.conn().transport.take() {
            transport.shutdown()?;
        }
        Ok(())
    }
}

impl io::Write for SyncLogClient {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for &SyncLogClient {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.send(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
