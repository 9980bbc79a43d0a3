//! Uploads in an S3-compatible bucket.

use crate::config::S3Config;
use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use engine_core::{ByteReader, Error, FileStore, Result};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// [`FileStore`] over an S3 bucket. Locations are object keys.
#[derive(Clone)]
pub struct S3FileStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3FileStore {
    pub async fn new(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(ref region) = config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(ref endpoint) = config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        info!(bucket = %config.bucket, prefix = %config.prefix, "Created S3 import file store");

        Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Only a missing or archived object is the uploader's problem; any other
/// `GetObject` failure is a storage error and stays out of the import status.
fn open_error<R>(location: &str, err: SdkError<GetObjectError, R>) -> Error
where
    R: std::fmt::Debug + 'static,
{
    match err.as_service_error() {
        Some(GetObjectError::NoSuchKey(_)) => Error::file_not_readable(location, "object not found"),
        Some(GetObjectError::InvalidObjectState(_)) => {
            Error::file_not_readable(location, "object is archived")
        }
        _ => Error::storage(format!(
            "Failed to open {}: {}",
            location,
            DisplayErrorContext(&err)
        )),
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn open(&self, location: &str) -> Result<ByteReader> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(location)
            .send()
            .await
            .map_err(|e| open_error(location, e))?;

        Ok(Box::pin(output.body.into_async_read()))
    }

    async fn delete(&self, location: &str) -> Result<()> {
        // Deleting a missing key succeeds in S3
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(location)
            .send()
            .await
            .map_err(|e| {
                Error::storage(format!("Failed to delete {}: {}", location, DisplayErrorContext(&e)))
            })?;
        Ok(())
    }

    async fn delete_older_than(&self, age: Duration) -> Result<u64> {
        let cutoff = SystemTime::now()
            .checked_sub(age)
            .unwrap_or(UNIX_EPOCH)
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let mut deleted = 0;
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    Error::storage(format!("Failed to list import files: {}", DisplayErrorContext(&e)))
                })?;

            for object in page.contents() {
                let (Some(key), Some(modified)) = (object.key(), object.last_modified()) else {
                    continue;
                };
                if modified.secs() >= cutoff {
                    continue;
                }
                match self.delete(key).await {
                    Ok(()) => {
                        debug!(key = %key, "Deleted orphaned import file");
                        deleted += 1;
                    }
                    Err(e) => warn!(key = %key, "{}", e),
                }
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(deleted)
    }
}
