//! Segment naming
//!
//! The live segment of stream `orders` is `orders.log`. Rotation renames it to
//! `orders-20240115_093000.log`, where the suffix is the UTC instant the segment was closed.
//! An external archival step may gzip it to `orders-20240115_093000.log.gz` and copy it to
//! `orders/20240115/orders-20240115_093000.log.gz` in remote storage.
//!
//! Because a segment is named after the moment it was closed, every record it holds was
//! created strictly before that instant. The finder relies on this.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};

/// `strftime` layout of the rotation suffix.
pub const ROTATION_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Layout of the per-day directory in remote storage.
pub const REMOTE_DAY_FORMAT: &str = "%Y%m%d";

pub const LOG_EXTENSION: &str = ".log";
pub const GZIP_EXTENSION: &str = ".gz";

const ROTATION_TIME_LEN: usize = 15;

/// File name of the live segment for `stream`.
pub fn live_file_name(stream: &str) -> String {
    format!("{stream}{LOG_EXTENSION}")
}

/// Backup name for `file_name` closed at `time`: `<stem>-<YYYYMMDD_HHMMSS><ext>`.
pub fn backup_file_name(file_name: &str, time: DateTime<Utc>) -> String {
    let stamp = time.format(ROTATION_TIME_FORMAT);
    let path = Path::new(file_name);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) {
        (Some(stem), Some(ext)) => format!("{stem}-{stamp}.{ext}"),
        _ => format!("{file_name}-{stamp}"),
    }
}

/// Remote directory holding the segments of `stream` closed on the day of `time`.
pub fn remote_day_prefix(stream: &str, time: DateTime<Utc>) -> String {
    format!("{stream}/{}", time.format(REMOTE_DAY_FORMAT))
}

/// Recover the rotation time from a segment name (`...-YYYYMMDD_HHMMSS.log[.gz]`).
///
/// Directory components are ignored. Returns `None` for the live segment and for anything
/// else that does not follow the convention.
pub fn parse_rotation_time(name: &str) -> Option<DateTime<Utc>> {
    let base = name.rsplit('/').next().unwrap_or(name);
    let base = base.strip_suffix(GZIP_EXTENSION).unwrap_or(base);
    let base = base.strip_suffix(LOG_EXTENSION)?;

    let split = base.len().checked_sub(ROTATION_TIME_LEN)?;
    let (head, stamp) = (base.get(..split)?, base.get(split..)?);
    if !head.ends_with('-') {
        return None;
    }

    NaiveDateTime::parse_from_str(stamp, ROTATION_TIME_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

/// A closed segment and the instant it was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    /// Path or object key as it was listed.
    pub name: String,
    pub rotation_time: DateTime<Utc>,
}

impl ArchiveFile {
    pub fn parse(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let rotation_time = parse_rotation_time(&name)?;
        Some(Self {
            name,
            rotation_time,
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.name.ends_with(GZIP_EXTENSION)
    }
}

/// Sort ascending by rotation time. Listing order from a filesystem or bucket is not trusted.
pub fn sort_by_rotation_time(files: &mut [ArchiveFile]) {
    files.sort_by(|a, b| {
        a.rotation_time
            .cmp(&b.rotation_time)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// First segment closed strictly after `time`, given `files` sorted ascending.
pub fn first_closed_after(files: &[ArchiveFile], time: DateTime<Utc>) -> Option<&ArchiveFile> {
    files.iter().find(|f| f.rotation_time > time)
}
