//! loghaul Finder
//!
//! Retrieve one record by stream name and xid from the segments the server wrote, whether it
//! still sits on local disk or has been archived to a bucket.
//!
//! ## Example
//!
//! ```ignore
//! let store = Arc::new(GoogleCloudStorageBuilder::from_env().with_bucket_name("logs").build()?);
//! let finder = Finder::new(
//!     FinderConfig::default(),
//!     Some(Arc::new(ObjectStoreArchives::new(store))),
//! );
//! let record = finder.find_record("orders", "9m4e2mr0ui3e8a215n4g").await?;
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod finder;
pub mod remote;

pub use config::FinderConfig;
pub use error::{FinderError, Result};
pub use finder::{Finder, Segment};
pub use remote::{ArchiveStore, ObjectStoreArchives, ObjectStream};
