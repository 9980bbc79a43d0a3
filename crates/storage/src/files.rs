//! Dispatch between the configured file stores.

use crate::config::StorageConfig;
use crate::local::LocalFileStore;
use crate::s3::S3FileStore;
use engine_core::{Error, FileStore, Result, StorageKind};
use std::sync::Arc;

/// The file stores an import may reference.
#[derive(Clone)]
pub struct ImportFiles {
    local: Arc<dyn FileStore>,
    object: Option<Arc<dyn FileStore>>,
}

impl ImportFiles {
    pub fn new(local: Arc<dyn FileStore>, object: Option<Arc<dyn FileStore>>) -> Self {
        Self { local, object }
    }

    /// Builds the stores described by `config`.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let local: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(&config.local_dir));
        let object = match config.s3 {
            Some(ref s3) => Some(Arc::new(S3FileStore::new(s3).await) as Arc<dyn FileStore>),
            None => None,
        };
        Self::new(local, object)
    }

    /// The store holding files of `kind`.
    pub fn store(&self, kind: StorageKind) -> Result<&dyn FileStore> {
        match kind {
            StorageKind::Local => Ok(self.local.as_ref()),
            StorageKind::ObjectStore => self
                .object
                .as_deref()
                .ok_or_else(|| Error::config("Object storage is not configured")),
        }
    }

    /// Every configured store, local first.
    pub fn all(&self) -> Vec<(StorageKind, Arc<dyn FileStore>)> {
        let mut stores = vec![(StorageKind::Local, self.local.clone())];
        if let Some(ref object) = self.object {
            stores.push((StorageKind::ObjectStore, object.clone()));
        }
        stores
    }
}
