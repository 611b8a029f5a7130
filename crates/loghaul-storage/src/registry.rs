//! Writer Registry - One Rotating Writer per Stream Name
//!
//! Every connection that names the same stream shares one [`RotatingWriter`]. The registry
//! creates it on first use and keeps it for the life of the process; entries are never
//! replaced or removed.
//!
//! ## Background Tasks
//!
//! - **Daily rotation**: once a day at a fixed UTC time, every known writer is rotated
//!   concurrently, so each day starts with fresh segments
//! - **Periodic flush**: buffered bytes are pushed to the live segments on an interval so the
//!   finder can read recent records
//!
//! ## Example Usage
//!
//! ```ignore
//! let registry = Arc::new(WriterRegistry::new(config, Arc::new(SystemClock))?);
//! let daily = registry.clone().start_daily_rotation(config.rotate_at);
//!
//! let writer = registry.get_or_create("orders").await?;
//! tokio::task::spawn_blocking(move || writer.write(b"line\n")).await??;
//!
//! // During shutdown:
//! daily.abort();
//! registry.close_all().await;
//! ```
//!
//! ## Thread Safety
//!
//! The map sits behind a `RwLock`: lookups share the read lock, creation takes the write
//! lock and checks again. Each writer carries its own mutex, so streams never block each
//! other.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::Instrument;

use loghaul_core::archive::live_file_name;
use loghaul_core::is_valid_stream_name;

use crate::clock::Clock;
use crate::config::WriterConfig;
use crate::error::{Result, StorageError};
use crate::writer::RotatingWriter;

type WriterMap = RwLock<HashMap<String, Arc<RotatingWriter>>>;

pub struct WriterRegistry {
    writers: WriterMap,
    config: WriterConfig,
    clock: Arc<dyn Clock>,
}

impl WriterRegistry {
    pub fn new(config: WriterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            writers: RwLock::new(HashMap::new()),
            config,
            clock,
        })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Get the writer for `name`, creating it on first use.
    ///
    /// The writer is rooted at `<base_dir>/<name>/<name>.log`. Every call for the same name
    /// returns the same instance.
    pub async fn get_or_create(&self, name: &str) -> Result<Arc<RotatingWriter>> {
        // Fast path
        {
            let writers = self.writers.read().await;
            if let Some(writer) = writers.get(name) {
                return Ok(Arc::clone(writer));
            }
        }

        if !is_valid_stream_name(name) {
            return Err(StorageError::InvalidStreamName(name.to_string()));
        }

        let mut writers = self.writers.write().await;

        // Double-check in case another task created it while we waited for the write lock
        if let Some(writer) = writers.get(name) {
            return Ok(Arc::clone(writer));
        }

        tracing::debug!(name = %name, "Creating rotating writer");

        let writer = Arc::new(RotatingWriter::new(
            self.config.base_dir.join(name),
            live_file_name(name),
            self.config.max_file_size,
            self.config.max_backup_name_attempts,
            Arc::clone(&self.clock),
        )?);
        writers.insert(name.to_string(), Arc::clone(&writer));

        Ok(writer)
    }

    pub async fn writer_count(&self) -> usize {
        self.writers.read().await.len()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.writers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn snapshot(&self) -> Vec<(String, Arc<RotatingWriter>)> {
        self.writers
            .read()
            .await
            .iter()
            .map(|(name, writer)| (name.clone(), Arc::clone(writer)))
            .collect()
    }

    /// Rotate every known writer concurrently.
    ///
    /// Failures are logged per writer and not retried. Returns the backups created.
    pub async fn rotate_all(&self) -> Vec<PathBuf> {
        let rotations = self.snapshot().await.into_iter().map(|(name, writer)| async move {
            let result = tokio::task::spawn_blocking(move || writer.rotate()).await;
            (name, result)
        });

        let mut backups = Vec::new();
        let mut error_count = 0;
        for (name, result) in futures::future::join_all(rotations).await {
            match result {
                Ok(Ok(Some(backup))) => backups.push(backup),
                Ok(Ok(None)) => {
                    tracing::trace!(name = %name, "Nothing to rotate");
                }
                Ok(Err(e)) => {
                    error_count += 1;
                    tracing::error!(name = %name, error = %e, "Failed to rotate writer");
                }
                Err(e) => {
                    error_count += 1;
                    tracing::error!(name = %name, error = %e, "Rotation task failed");
                }
            }
        }

        tracing::info!(
            rotated = backups.len(),
            errors = error_count,
            "Rotation pass completed"
        );
        backups
    }

    /// Flush buffered bytes of every writer to disk.
    pub async fn flush_all(&self) {
        for (name, writer) in self.snapshot().await {
            match tokio::task::spawn_blocking(move || writer.flush()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(name = %name, error = %e, "Failed to flush writer"),
                Err(e) => tracing::error!(name = %name, error = %e, "Flush task failed"),
            }
        }
    }

    /// Flush and close every writer. Used on shutdown; live files keep their names.
    pub async fn close_all(&self) {
        let writers = self.snapshot().await;
        let total = writers.len();
        let mut error_count = 0;

        for (name, writer) in writers {
            let result = tokio::task::spawn_blocking(move || writer.close())
                .await
                .map_err(StorageError::from)
                .and_then(|r| r);
            if let Err(e) = result {
                error_count += 1;
                tracing::error!(name = %name, error = %e, "Failed to close writer");
            }
        }

        tracing::info!(writers = total, errors = error_count, "Closed all writers");
    }

    /// Spawn the task that rotates every writer once a day at `at` (UTC).
    ///
    /// Wall-clock time comes from the registry's [`Clock`]; the wait itself uses tokio's
    /// timer. Abort the returned handle to stop it.
    pub fn start_daily_rotation(self: Arc<Self>, at: NaiveTime) -> JoinHandle<()> {
        let span = tracing::info_span!("daily_rotation", at = %at);
        tokio::spawn(
            async move {
                let mut last_fire: Option<DateTime<Utc>> = None;
                loop {
                    let now = self.clock.now();
                    // never fire twice for the same slot if the clock lags the timer
                    let from = last_fire.map_or(now, |last| last.max(now));
                    let next = next_fire_after(from, at);
                    let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

                    tracing::debug!(next = %next, delay_secs = delay.as_secs(), "Next rotation scheduled");
                    time::sleep(delay).await;

                    self.rotate_all().await;
                    last_fire = Some(next);
                }
            }
            .instrument(span),
        )
    }

    /// Spawn the task that flushes every writer each `interval`.
    pub fn start_background_flush(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                tracing::trace!("Background flush tick");
                self.flush_all().await;
            }
        })
    }
}

/// First instant strictly after `now` whose UTC time of day is `at`.
pub fn next_fire_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}
