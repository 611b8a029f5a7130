//! loghaul Storage Layer
//!
//! This crate persists raw log bytes for each stream as size-rotated local files.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────┐
//! │ connection tasks  │  (one per producer)
//! └─────────┬─────────┘
//!           │ get_or_create(name)
//!           ▼
//! ┌───────────────────┐      daily at rotate_at
//! │  WriterRegistry   │ ◄──────────────────────── rotation task
//! └─────────┬─────────┘
//!           │ Arc<RotatingWriter>
//!           ▼
//! ┌───────────────────┐
//! │  RotatingWriter   │  <base_dir>/<name>/<name>.log
//! │  - 16 KiB buffer  │        │ max_size reached
//! │  - byte counter   │        ▼
//! └───────────────────┘  <base_dir>/<name>/<name>-YYYYMMDD_HHMMSS.log
//! ```
//!
//! ## Main Components
//!
//! - [`RotatingWriter`]: synchronous append + rotate state machine for one stream
//! - [`WriterRegistry`]: name → writer map with the daily rotation and flush tasks
//! - [`Clock`]: injectable wall clock ([`SystemClock`] in production, [`MockClock`] in tests)
//! - [`WriterConfig`]: base directory, segment size and schedule

pub mod clock;
pub mod config;
pub mod error;
pub mod registry;
pub mod writer;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::WriterConfig;
pub use error::{Result, StorageError};
pub use registry::{next_fire_after, WriterRegistry};
pub use writer::RotatingWriter;
