use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::ObjectStore;
use crate::common::error::{StorageError, StorageResult};

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone)]
pub struct StorageService {
    client: Client,
    region: String,
}

impl StorageService {
    pub fn new(endpoint: &str, region: &str, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!(endpoint, "S3 client configured");

        Self {
            client,
            region: region.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for StorageService {
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<()> {
        debug!("Downloading {}/{} to {}", bucket, key, dest.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if is_missing_object(e.as_service_error()) {
                    StorageError::not_found(bucket, key)
                } else {
                    StorageError::DownloadFailed(DisplayErrorContext(&e).to_string())
                }
            })?;

        // Stream the body to disk rather than buffering whole videos in memory.
        let mut body = response.body;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0usize;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        info!("Downloaded {}/{} ({} bytes)", bucket, key, written);
        Ok(())
    }

    async fn publish(&self, bucket: &str, key: &str, src: &Path) -> StorageResult<()> {
        debug!("Uploading {} to {}/{}", src.display(), bucket, key);

        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type("video/mp4")
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(StorageError::BucketFailed(
                DisplayErrorContext(&e).to_string(),
            )),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            // Lost a race with another worker; the bucket is there either way.
            Err(e) if is_already_ours(e.as_service_error()) => {
                debug!(bucket, "Bucket already owned by us");
                Ok(())
            }
            Err(e) => Err(StorageError::BucketFailed(
                DisplayErrorContext(&e).to_string(),
            )),
        }
    }
}

fn is_missing_object(err: Option<&GetObjectError>) -> bool {
    err.is_some_and(GetObjectError::is_no_such_key)
}

fn is_already_ours(err: Option<&CreateBucketError>) -> bool {
    err.is_some_and(CreateBucketError::is_bucket_already_owned_by_you)
}
