//! Archive store
//!
//! Rotated segments are eventually gzipped and copied to a bucket under
//! `<name>/<YYYYMMDD>/<name>-YYYYMMDD_HHMMSS.log.gz`. The finder only needs to list one day
//! directory and stream one object, which is all [`ArchiveStore`] asks for.
//!
//! [`ObjectStoreArchives`] adapts any `object_store` backend (GCS, S3, local filesystem,
//! in-memory for tests).

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::ObjectStore;

use loghaul_core::ArchiveFile;

use crate::error::Result;

/// Body of an archived object.
pub type ObjectStream = BoxStream<'static, io::Result<Bytes>>;

#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Every segment directly under `dir`, in listing order. Objects that do not follow the
    /// segment naming convention are skipped.
    async fn list_objects(&self, dir: &str) -> Result<Vec<ArchiveFile>>;

    /// Stream the raw (still compressed) bytes of `name`.
    async fn open_object(&self, name: &str) -> Result<ObjectStream>;
}

pub struct ObjectStoreArchives {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreArchives {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ArchiveStore for ObjectStoreArchives {
    async fn list_objects(&self, dir: &str) -> Result<Vec<ArchiveFile>> {
        let prefix = Path::from(dir);
        let objects: Vec<_> = self.store.list(Some(&prefix)).try_collect().await?;

        let files = objects
            .into_iter()
            .filter_map(|meta| ArchiveFile::parse(meta.location.to_string()))
            .collect();
        Ok(files)
    }

    async fn open_object(&self, name: &str) -> Result<ObjectStream> {
        let result = self.store.get(&Path::from(name)).await?;
        Ok(result.into_stream().map_err(io::Error::other).boxed())
    }
}
