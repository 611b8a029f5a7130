//! loghaul-finder
//!
//! HTTP service answering `GET /streams/:name/records/:id` from local segments and, for older
//! records, from an archive bucket.
//!
//! ## Configuration
//!
//! - `LOG_BASE_DIR`: storage root shared with the server (default: data/log/)
//! - `BIND_ADDR`: listen address (default: 0.0.0.0:4565)
//! - `ARCHIVE_BACKEND`: gcs, s3, local or none (default: none)
//! - `BUCKET_ID`: bucket name for gcs and s3; credentials come from the usual environment
//! - `LOCAL_ARCHIVE_PATH`: archive root for the local backend
//! - `LIST_TIMEOUT_SECS`: bound on one archive listing (default: 10)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use object_store::ObjectStore;

use loghaul_finder::{api, ArchiveStore, Finder, FinderConfig, ObjectStoreArchives};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Gcs,
    S3,
    Local,
    None,
}

#[derive(Parser, Debug)]
#[command(name = "loghaul-finder", version, about = "Look up log records by id")]
struct Args {
    #[arg(long, env = "LOG_BASE_DIR", default_value = "data/log/")]
    base_dir: PathBuf,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:4565")]
    bind_addr: String,

    #[arg(long, env = "ARCHIVE_BACKEND", value_enum, default_value_t = Backend::None)]
    archive_backend: Backend,

    #[arg(long, env = "BUCKET_ID")]
    bucket_id: Option<String>,

    #[arg(long, env = "LOCAL_ARCHIVE_PATH")]
    local_archive_path: Option<PathBuf>,

    #[arg(long, env = "LIST_TIMEOUT_SECS", default_value_t = 10)]
    list_timeout_secs: u64,
}

fn archive_store(args: &Args) -> Result<Option<Arc<dyn ArchiveStore>>> {
    let bucket = || {
        args.bucket_id
            .clone()
            .context("--bucket-id is required for this archive backend")
    };

    let store: Arc<dyn ObjectStore> = match args.archive_backend {
        Backend::None => return Ok(None),
        Backend::Gcs => Arc::new(
            object_store::gcp::GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(bucket()?)
                .build()?,
        ),
        Backend::S3 => Arc::new(
            object_store::aws::AmazonS3Builder::from_env()
                .with_bucket_name(bucket()?)
                .build()?,
        ),
        Backend::Local => {
            let path = args
                .local_archive_path
                .as_ref()
                .context("--local-archive-path is required for the local backend")?;
            tracing::info!("Using local archive at {}", path.display());
            Arc::new(object_store::local::LocalFileSystem::new_with_prefix(path)?)
        }
    };

    Ok(Some(Arc::new(ObjectStoreArchives::new(store))))
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

    let args = Args::parse();
    tracing::info!(backend = ?args.archive_backend, "Initializing archive store");
    let remote = archive_store(&args)?;

    let config = FinderConfig {
        base_dir: args.base_dir,
        bind_addr: args.bind_addr,
        list_timeout_secs: args.list_timeout_secs,
    };
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    let finder = Arc::new(Finder::new(config, remote));

    api::serve(finder, listener, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received SIGINT (Ctrl+C), shutting down");
    })
    .await?;

    Ok(())
}
