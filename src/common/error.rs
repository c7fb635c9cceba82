//! Error taxonomy for the worker.
//!
//! Per-job errors ([`JobError`]) end the current job and never leave the
//! pipeline. [`InfrastructureError`] belongs to the worker loop and triggers
//! its backoff-and-retry policy. [`CleanupError`] is only ever logged.

use std::path::PathBuf;

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("bucket operation failed: {0}")]
    BucketFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to start encoder: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed waiting for encoder: {0}")]
    Wait(#[source] std::io::Error),

    #[error("encoder exited with status {}", exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Failed { exit_code: Option<i32> },

    #[error("encoder timed out after {0} seconds")]
    TimedOut(u64),
}

/// Errors that end one job. Each one is terminal for that job only.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("fetch failed: {0}")]
    Fetch(#[source] StorageError),

    #[error("transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("publish failed: {0}")]
    Publish(#[source] StorageError),
}

impl JobError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JobError::MalformedPayload(_) => "malformed_payload",
            JobError::Fetch(_) => "fetch",
            JobError::Transcode(_) => "transcode",
            JobError::Publish(_) => "publish",
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to remove {}: {source}", path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Failures of the long-lived clients, outside any single job.
#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
