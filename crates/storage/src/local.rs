//! Uploads on local disk.

use async_trait::async_trait;
use engine_core::{ByteReader, Error, FileStore, Result};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// [`FileStore`] for files on the local filesystem.
///
/// Locations are paths inside the upload directory, absolute or relative to
/// it; anything else is refused. `delete_older_than` sweeps the upload
/// directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    upload_dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &PathBuf {
        &self.upload_dir
    }

    /// Maps `location` to a path under the upload directory.
    ///
    /// The check is lexical: `..` components are refused outright.
    fn resolve(&self, location: &str) -> Option<PathBuf> {
        let path = Path::new(location);
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return None;
        }
        let path = if path.is_relative() && !path.starts_with(&self.upload_dir) {
            self.upload_dir.join(path)
        } else {
            path.to_path_buf()
        };
        path.starts_with(&self.upload_dir).then_some(path)
    }
}

const OUTSIDE_UPLOAD_DIR: &str = "outside the upload directory";

#[async_trait]
impl FileStore for LocalFileStore {
    async fn open(&self, location: &str) -> Result<ByteReader> {
        let path = self
            .resolve(location)
            .ok_or_else(|| Error::file_not_readable(location, OUTSIDE_UPLOAD_DIR))?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Error::file_not_readable(location, e))?;
        if !metadata.is_file() {
            return Err(Error::file_not_readable(location, "not a regular file"));
        }

        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| Error::file_not_readable(location, e))?;

        Ok(Box::pin(file))
    }

    async fn delete(&self, location: &str) -> Result<()> {
        let Some(path) = self.resolve(location) else {
            warn!(location = %location, "Refusing to delete file outside the upload directory");
            return Err(Error::storage(format!(
                "Refusing to delete {}: {}",
                location, OUTSIDE_UPLOAD_DIR
            )));
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(location = %location, "Import file already gone");
                Ok(())
            }
            Err(e) => Err(Error::storage(format!("Failed to delete {}: {}", location, e))),
        }
    }

    async fn delete_older_than(&self, age: Duration) -> Result<u64> {
        let mut entries = match tokio::fs::read_dir(&self.upload_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(Error::storage(format!(
                    "Failed to list {}: {}",
                    self.upload_dir.display(),
                    e
                )))
            }
        };

        let cutoff = SystemTime::now()
            .checked_sub(age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut deleted = 0;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::storage(format!("Failed to read directory entry: {}", e)))?
        {
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let modified = metadata.modified().unwrap_or(SystemTime::now());
            if modified >= cutoff {
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), "Failed to delete orphaned file: {}", e),
            }
        }

        Ok(deleted)
    }
}
