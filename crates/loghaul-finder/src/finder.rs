//! Time-indexed record lookup
//!
//! Every record carries an xid whose leading 4 bytes are its creation time. Segments are
//! named after the instant they were closed, so the segment holding a record is the first
//! one closed after the record was created:
//!
//! ```text
//!   orders-20240115_000000.log.gz   orders-20240115_120000.log.gz   orders.log (live)
//!   ─────────────────────────────┼──────────────────────────────┼──────────────────────▶ t
//!                                 ▲                              ▲
//!                           id @ 09:41  ───────────────▶  found in the 12:00 segment
//! ```
//!
//! ## Resolution order
//!
//! 1. Local archives in `<base_dir>/<name>/`, sorted by rotation time
//! 2. No archive closed after the record → the live segment
//! 3. Record older than every local archive → the remote store, day directory of the record,
//!    then the following day (a record from 23:59 sits in the segment rotated at midnight)
//!
//! The selected segment is scanned line by line; the first line mentioning the id wins.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use flate2::read::GzDecoder;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::instrument;

use loghaul_core::archive::{
    first_closed_after, live_file_name, remote_day_prefix, sort_by_rotation_time,
};
use loghaul_core::{is_valid_stream_name, ArchiveFile, Identifier};

use crate::config::FinderConfig;
use crate::error::{FinderError, Result};
use crate::remote::ArchiveStore;

/// Where a record is expected to live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Live(PathBuf),
    Local(ArchiveFile),
    Remote(ArchiveFile),
}

pub struct Finder {
    config: FinderConfig,
    remote: Option<Arc<dyn ArchiveStore>>,
}

impl Finder {
    pub fn new(config: FinderConfig, remote: Option<Arc<dyn ArchiveStore>>) -> Self {
        Self { config, remote }
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Return the record `id` of stream `name`, starting at its first `{`.
    #[instrument(skip(self), fields(base_dir = %self.config.base_dir.display()))]
    pub async fn find_record(&self, name: &str, id: &str) -> Result<String> {
        let identifier = Identifier::parse(id).map_err(FinderError::InvalidIdentifier)?;
        if !is_valid_stream_name(name) {
            return Err(FinderError::InvalidStreamName(name.to_string()));
        }

        let record_time = identifier.time();
        tracing::debug!(record_time = %record_time, "Resolving segment");

        let segment = self.locate(name, record_time).await?;
        tracing::debug!(segment = ?segment, "Scanning segment");

        let needle = identifier.to_string();
        let found = match segment {
            Segment::Live(path) => {
                tokio::task::spawn_blocking(move || scan_file(&path, false, &needle)).await??
            }
            Segment::Local(file) => {
                let path = PathBuf::from(&file.name);
                let compressed = file.is_compressed();
                tokio::task::spawn_blocking(move || scan_file(&path, compressed, &needle))
                    .await??
            }
            Segment::Remote(file) => self.scan_remote(&file, needle).await?,
        };

        found.ok_or(FinderError::NotFound)
    }

    /// Pick the segment that must contain a record created at `record_time`.
    pub async fn locate(&self, name: &str, record_time: DateTime<Utc>) -> Result<Segment> {
        let dir = self.config.base_dir.join(name);
        let archives = list_local_archives(&dir, name).await?;

        let live = || Segment::Live(dir.join(live_file_name(name)));
        let Some(earliest) = archives.first() else {
            return Ok(live());
        };

        if record_time < earliest.rotation_time {
            return self.locate_remote(name, record_time).await;
        }

        Ok(first_closed_after(&archives, record_time)
            .cloned()
            .map_or_else(live, Segment::Local))
    }

    async fn locate_remote(&self, name: &str, record_time: DateTime<Utc>) -> Result<Segment> {
        let Some(remote) = &self.remote else {
            tracing::debug!("No archive store configured");
            return Err(FinderError::NotFound);
        };

        for day in [record_time, record_time + TimeDelta::days(1)] {
            let dir = remote_day_prefix(name, day);
            let mut files = tokio::time::timeout(self.config.list_timeout(), remote.list_objects(&dir))
                .await
                .map_err(|_| FinderError::ListTimeout {
                    dir: dir.clone(),
                    timeout: self.config.list_timeout(),
                })??;

            files.retain(|f| belongs_to(&f.name, name));
            sort_by_rotation_time(&mut files);

            if let Some(file) = first_closed_after(&files, record_time) {
                return Ok(Segment::Remote(file.clone()));
            }
        }

        Err(FinderError::NotFound)
    }

    async fn scan_remote(&self, file: &ArchiveFile, needle: String) -> Result<Option<String>> {
        let remote = self.remote.as_ref().ok_or(FinderError::NotFound)?;
        let stream = remote.open_object(&file.name).await?;

        // bridges the async body into the blocking scan below
        let reader = SyncIoBridge::new(StreamReader::new(stream));
        let compressed = file.is_compressed();

        let found = tokio::task::spawn_blocking(move || {
            if compressed {
                scan_lines(GzDecoder::new(reader), &needle)
            } else {
                scan_lines(reader, &needle)
            }
        })
        .await??;
        Ok(found)
    }
}

/// Rotated segments of `name` in `dir`, oldest first. A missing directory has none.
async fn list_local_archives(dir: &Path, name: &str) -> Result<Vec<ArchiveFile>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !belongs_to(file_name, name) {
            continue;
        }
        if let Some(mut file) = ArchiveFile::parse(file_name) {
            file.name = entry.path().to_string_lossy().into_owned();
            files.push(file);
        }
    }

    sort_by_rotation_time(&mut files);
    Ok(files)
}

/// Whether the segment called `key` (path or object key) was rotated from stream `name`.
fn belongs_to(key: &str, name: &str) -> bool {
    let base = key.rsplit('/').next().unwrap_or(key);
    base.strip_prefix(name)
        .is_some_and(|rest| rest.starts_with('-'))
}

fn scan_file(path: &Path, compressed: bool, needle: &str) -> Result<Option<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(FinderError::NotFound),
        Err(e) => return Err(e.into()),
    };

    if compressed {
        scan_lines(GzDecoder::new(file), needle)
    } else {
        scan_lines(file, needle)
    }
}

/// First line containing `needle`, starting at its first `{`, without the line terminator.
///
/// Lines are compared as lossy UTF-8 so a corrupt byte cannot abort the scan.
pub fn scan_lines<R: Read>(reader: R, needle: &str) -> Result<Option<String>> {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }

        let text = String::from_utf8_lossy(&line);
        if !text.contains(needle) {
            continue;
        }

        let text = text.trim_end_matches(['\n', '\r']);
        let record = text.find('{').map_or(text, |start| &text[start..]);
        return Ok(Some(record.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_scan_trims_prefix_and_newline() {
        let data = b"2024-01-15T09:41:00Z INFO {\"id\":\"abc\",\"msg\":\"hi\"}\r\n";
        let found = scan_lines(Cursor::new(data.to_vec()), "abc").unwrap();
        assert_eq!(found.as_deref(), Some("{\"id\":\"abc\",\"msg\":\"hi\"}"));
    }

    #[test]
    fn test_scan_line_without_brace_returned_whole() {
        let found = scan_lines(Cursor::new(b"first\nplain abc line\n".to_vec()), "abc").unwrap();
        assert_eq!(found.as_deref(), Some("plain abc line"));
    }

    #[test]
    fn test_scan_final_line_without_newline() {
        let found = scan_lines(Cursor::new(b"a\n{\"id\":\"abc\"}".to_vec()), "abc").unwrap();
        assert_eq!(found.as_deref(), Some("{\"id\":\"abc\"}"));
    }

    #[test]
    fn test_scan_survives_invalid_utf8() {
        let mut data = b"\xff\xfe garbage\n".to_vec();
        data.extend_from_slice(b"{\"id\":\"abc\"}\n");
        let found = scan_lines(Cursor::new(data), "abc").unwrap();
        assert_eq!(found.as_deref(), Some("{\"id\":\"abc\"}"));
    }

    #[test]
    fn test_scan_miss() {
        assert_eq!(scan_lines(Cursor::new(b"a\nb\n".to_vec()), "abc").unwrap(), None);
    }

    #[test]
    fn test_belongs_to() {
        assert!(belongs_to("orders-20240115_000000.log", "orders"));
        assert!(belongs_to("orders/20240115/orders-20240115_000000.log.gz", "orders"));
        assert!(!belongs_to("orders.log", "orders"));
        assert!(!belongs_to("ordersx-20240115_000000.log", "orders"));
    }
}
