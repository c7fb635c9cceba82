pub mod s3;

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::common::error::StorageResult;

/// Get/put access to object storage, keyed by bucket and object key.
///
/// Every call is one remote round trip with no local retry.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Downloads `bucket/key` into `dest`. A failed download may leave a
    /// partial file at `dest`; the caller owns its removal.
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<()>;

    /// Uploads the file at `src` to `bucket/key`.
    async fn publish(&self, bucket: &str, key: &str, src: &Path) -> StorageResult<()>;

    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool>;

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Check-then-create. The existence check is advisory: another worker may
    /// create the bucket in between, which `create_bucket` must tolerate.
    async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()> {
        if !self.bucket_exists(bucket).await? {
            self.create_bucket(bucket).await?;
            info!(bucket, "Created bucket");
        }
        Ok(())
    }
}
