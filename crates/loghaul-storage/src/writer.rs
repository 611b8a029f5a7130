//! Rotating Writer - One Live Segment per Stream
//!
//! `RotatingWriter` appends raw bytes to `<dir>/<name>.log` and renames the file to a
//! timestamped backup once it grows past `max_size` (or when asked to by the daily schedule).
//!
//! ## State Machine
//!
//! ```text
//!            write()                       rotate() / close()
//!  Closed ─────────────────► Open ─────────────────────────────► Closed
//!    ▲   open + stat size     │  (16 KiB BufWriter, byte count)
//!    │                        │
//!    └────────────────────────┘
//!       write() reaching max_size rotates inline
//! ```
//!
//! ## Rotation
//!
//! 1. Flush and close the live handle
//! 2. Pick `<stem>-YYYYMMDD_HHMMSS<ext>` from the clock; if that name already holds data,
//!    wait one second (through the clock) and try again, up to `max_backup_name_attempts`
//! 3. Rename the live file to the backup name
//!
//! The next write opens a fresh live file. If the rename fails the data stays at the live
//! path and the next write appends to it again.
//!
//! ## Thread Safety
//!
//! `write`, `rotate`, `flush` and `close` share one mutex. All of them do blocking file I/O;
//! async callers run them on the blocking pool.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use loghaul_core::archive::backup_file_name;

use crate::clock::Clock;
use crate::error::{Result, StorageError};

/// Capacity of the buffered writer in front of the live segment.
pub const WRITE_BUFFER_SIZE: usize = 16 * 1024;

const BACKUP_NAME_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Default)]
struct WriterState {
    file: Option<BufWriter<File>>,
    written: u64,
}

pub struct RotatingWriter {
    dir: PathBuf,
    file_name: String,
    max_size: u64,
    max_backup_name_attempts: u32,
    clock: Arc<dyn Clock>,
    state: Mutex<WriterState>,
}

impl std::fmt::Debug for RotatingWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingWriter")
            .field("dir", &self.dir)
            .field("file_name", &self.file_name)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl RotatingWriter {
    /// Create a writer for `<dir>/<file_name>`. Nothing is opened until the first write.
    pub fn new(
        dir: impl Into<PathBuf>,
        file_name: impl Into<String>,
        max_size: u64,
        max_backup_name_attempts: u32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if max_size == 0 {
            return Err(StorageError::InvalidMaxSize);
        }

        Ok(Self {
            dir: dir.into(),
            file_name: file_name.into(),
            max_size,
            max_backup_name_attempts: max_backup_name_attempts.max(1),
            clock,
            state: Mutex::new(WriterState::default()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the live segment.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Bytes in the live segment, including any still buffered. Zero while closed.
    pub fn size(&self) -> u64 {
        self.lock().written
    }

    pub fn is_open(&self) -> bool {
        self.lock().file.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `buf` to the live segment, rotating inline once the segment reaches `max_size`.
    ///
    /// Returns the number of bytes accepted, which is always `buf.len()` on success. When the
    /// triggered rotation fails the bytes are already in the live segment and the rotation
    /// error is returned.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.lock();

        if state.file.is_none() {
            let (file, written) = self.open()?;
            state.file = Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file));
            state.written = written;
        }

        if let Some(file) = state.file.as_mut() {
            file.write_all(buf)?;
        }
        state.written += buf.len() as u64;

        if state.written >= self.max_size {
            tracing::debug!(
                path = %self.path().display(),
                written = state.written,
                max_size = self.max_size,
                "Segment full, rotating"
            );
            self.rotate_locked(&mut state)?;
        }

        Ok(buf.len())
    }

    fn open(&self) -> Result<(File, u64)> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path();
        let file = File::options().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        tracing::debug!(path = %path.display(), written, "Opened live segment");
        Ok((file, written))
    }

    /// Close the live segment and rename it to a timestamped backup.
    ///
    /// Returns the backup path, or `None` when there was nothing to rotate (no live file, or
    /// an empty one).
    pub fn rotate(&self) -> Result<Option<PathBuf>> {
        let mut state = self.lock();
        self.rotate_locked(&mut state)
    }

    fn rotate_locked(&self, state: &mut WriterState) -> Result<Option<PathBuf>> {
        let live = self.path();

        match state.file.take() {
            Some(mut file) => {
                state.written = 0;
                file.flush()?;
            }
            None => match fs::metadata(&live) {
                Ok(meta) if meta.len() > 0 => {}
                _ => return Ok(None),
            },
        }

        let backup = self.backup_path()?;
        if let Err(source) = fs::rename(&live, &backup) {
            tracing::error!(
                from = %live.display(),
                to = %backup.display(),
                error = %source,
                "Failed to rename segment, next write appends to the live file"
            );
            return Err(StorageError::Rotation {
                from: live,
                to: backup,
                source,
            });
        }

        tracing::info!(
            from = %live.display(),
            to = %backup.display(),
            "Rotated segment"
        );
        Ok(Some(backup))
    }

    fn backup_path(&self) -> Result<PathBuf> {
        for attempt in 0..self.max_backup_name_attempts {
            if attempt > 0 {
                self.clock.sleep(BACKUP_NAME_RETRY_DELAY);
            }

            let candidate = self
                .dir
                .join(backup_file_name(&self.file_name, self.clock.now()));
            match fs::metadata(&candidate) {
                Ok(meta) if meta.len() > 0 => {
                    tracing::debug!(
                        candidate = %candidate.display(),
                        attempt,
                        "Backup name taken"
                    );
                }
                _ => return Ok(candidate),
            }
        }

        tracing::error!(
            path = %self.path().display(),
            attempts = self.max_backup_name_attempts,
            "No free backup name, leaving data in the live segment"
        );
        Err(StorageError::BackupNameExhausted {
            path: self.path(),
            attempts: self.max_backup_name_attempts,
        })
    }

    /// Push buffered bytes to the live segment without closing it.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.lock();
        if let Some(file) = state.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    /// Flush and close the live segment without renaming it.
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock();
        state.written = 0;
        if let Some(mut file) = state.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use chrono::TimeZone;
    use chrono::Utc;
    use tempfile::TempDir;

    fn mock_clock() -> Arc<MockClock> {
        Arc::new(MockClock::with_time(
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap(),
        ))
    }

    fn writer(dir: &TempDir, max_size: u64, clock: Arc<MockClock>) -> RotatingWriter {
        RotatingWriter::new(dir.path().join("s"), "s.log", max_size, 10, clock).unwrap()
    }

    #[test]
    fn test_zero_max_size_rejected() {
        let err =
            RotatingWriter::new("/tmp", "s.log", 0, 10, Arc::new(MockClock::new())).unwrap_err();
        assert!(matches!(err, StorageError::InvalidMaxSize));
    }

    #[test]
    fn test_opens_lazily() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, 1024, mock_clock());

        assert!(!w.is_open());
        assert!(!w.path().exists());

        w.write(b"hello").unwrap();
        assert!(w.is_open());
        assert_eq!(w.size(), 5);
    }

    #[test]
    fn test_reopen_recovers_size() {
        let dir = TempDir::new().unwrap();
        let clock = mock_clock();
        {
            let w = writer(&dir, 1024, clock.clone());
            w.write(b"0123456789").unwrap();
            w.close().unwrap();
        }

        let w = writer(&dir, 1024, clock);
        w.write(b"ab").unwrap();
        assert_eq!(w.size(), 12);
        w.flush().unwrap();
        assert_eq!(fs::read(w.path()).unwrap(), b"0123456789ab");
    }

    #[test]
    fn test_rotates_when_reaching_max_size() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, 10, mock_clock());

        w.write(b"12345").unwrap();
        assert!(w.is_open());
        w.write(b"67890").unwrap();
        assert!(!w.is_open());
        assert_eq!(w.size(), 0);

        let backup = dir.path().join("s").join("s-20240115_093000.log");
        assert_eq!(fs::read(&backup).unwrap(), b"1234567890");
        assert!(!w.path().exists());

        w.write(b"next").unwrap();
        w.flush().unwrap();
        assert_eq!(fs::read(w.path()).unwrap(), b"next");
    }

    #[test]
    fn test_rotate_closed_writer_without_file_is_noop() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, 1024, mock_clock());
        assert_eq!(w.rotate().unwrap(), None);
    }

    #[test]
    fn test_empty_write_opens_nothing() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, 1024, mock_clock());

        assert_eq!(w.write(b"").unwrap(), 0);
        assert!(!w.is_open());
        assert!(!w.path().exists());

        assert_eq!(w.rotate().unwrap(), None);
        assert_eq!(fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
    }

    #[test]
    fn test_rotate_closed_writer_with_leftover_file() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, 1024, mock_clock());
        w.write(b"left over").unwrap();
        w.close().unwrap();

        let backup = w.rotate().unwrap().unwrap();
        assert_eq!(fs::read(backup).unwrap(), b"left over");
    }

    #[test]
    fn test_same_second_rotations_get_distinct_names() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, 1024, mock_clock());

        w.write(b"first").unwrap();
        let a = w.rotate().unwrap().unwrap();
        w.write(b"second").unwrap();
        let b = w.rotate().unwrap().unwrap();

        assert_ne!(a, b);
        assert!(b.ends_with("s-20240115_093001.log"));
        assert_eq!(fs::read(a).unwrap(), b"first");
        assert_eq!(fs::read(b).unwrap(), b"second");
    }

    #[test]
    fn test_close_keeps_live_name() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, 1024, mock_clock());
        w.write(b"data").unwrap();
        w.close().unwrap();

        assert!(!w.is_open());
        assert_eq!(fs::read(w.path()).unwrap(), b"data");
    }
}
