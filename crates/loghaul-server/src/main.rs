//! loghaul-server
//!
//! Receives named log streams over TCP and stores them under `--base-dir`.
//!
//! ## Configuration
//!
//! Every flag can also come from the environment:
//! - `LOG_BASE_DIR`: storage root (default: data/log/)
//! - `BIND_ADDR`: listen address (default: 0.0.0.0:4560)
//! - `MAX_FILE_SIZE`: segment size in MB before rotating (default: 2048)
//! - `ROTATE_AT`: UTC time of the daily rotation (default: 00:00:00)
//! - `FLUSH_INTERVAL_MS`: background flush period, 0 disables (default: 1000)
//! - `RUST_LOG`: log filter (default: info)
//!
//! SIGINT and SIGTERM stop accepting and flush every open segment before exiting.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveTime;
use clap::Parser;

use loghaul_server::{Server, ServerConfig};
use loghaul_storage::{SystemClock, WriterConfig, WriterRegistry};

#[derive(Parser, Debug)]
#[command(name = "loghaul-server", version, about = "Persist named log streams to rotated files")]
struct Args {
    /// Directory holding one sub-directory per stream
    #[arg(long, env = "LOG_BASE_DIR", default_value = "data/log/")]
    base_dir: PathBuf,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:4560")]
    bind_addr: String,

    /// Segment size in MB
    #[arg(long, env = "MAX_FILE_SIZE", default_value_t = 2048)]
    max_file_size: i64,

    /// Daily rotation time, HH:MM:SS in UTC
    #[arg(long, env = "ROTATE_AT", default_value = "00:00:00")]
    rotate_at: NaiveTime,

    #[arg(long, env = "FLUSH_INTERVAL_MS", default_value_t = 1000)]
    flush_interval_ms: u64,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        if self.max_file_size <= 0 {
            anyhow::bail!("max file size must be positive, got {}", self.max_file_size);
        }

        let config = ServerConfig {
            bind_addr: self.bind_addr,
            writer: WriterConfig {
                base_dir: self.base_dir,
                max_file_size: self.max_file_size as u64 * 1024 * 1024,
                rotate_at: self.rotate_at,
                flush_interval_ms: self.flush_interval_ms,
                ..Default::default()
            },
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config()?;

    tracing::info!(
        base_dir = %config.writer.base_dir.display(),
        max_file_size = config.writer.max_file_size,
        rotate_at = %config.writer.rotate_at,
        "Starting loghaul server"
    );

    let registry = Arc::new(WriterRegistry::new(
        config.writer.clone(),
        Arc::new(SystemClock),
    )?);

    let daily = Arc::clone(&registry).start_daily_rotation(config.writer.rotate_at);
    let flush = (config.writer.flush_interval_ms > 0).then(|| {
        Arc::clone(&registry)
            .start_background_flush(Duration::from_millis(config.writer.flush_interval_ms))
    });

    let server = Server::bind(config, Arc::clone(&registry)).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            },
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
            },
        }

        let _ = shutdown_tx.send(());
    });

    let result = server.run_until(shutdown_rx).await;

    daily.abort();
    if let Some(flush) = flush {
        flush.abort();
    }

    // Flush all writers before exiting
    tracing::info!("Flushing all pending writes...");
    registry.close_all().await;

    result?;
    tracing::info!("loghaul server shut down gracefully");
    Ok(())
}
