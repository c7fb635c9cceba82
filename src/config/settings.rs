use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::env::{self, EnvKey};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub redis_url: String,
    pub queue_name: String,
    pub queue_poll_timeout_secs: u64,
    pub minio_url: String,
    pub minio_region: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub input_bucket: String,
    pub output_bucket: String,
    pub scratch_dir: PathBuf,
    pub ffmpeg_path: String,
    pub transcode_timeout_secs: Option<u64>,
    pub retry_delay_secs: u64,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let secure = env::get_parsed(EnvKey::MinioSecure, false);
        let endpoint = env::get_or(EnvKey::MinioUrl, "localhost:9000");

        Ok(Self {
            redis_url: env::get_or(EnvKey::RedisUrl, "redis://localhost:6379/0"),
            queue_name: env::get_or(EnvKey::QueueName, "media_tasks:queue"),
            queue_poll_timeout_secs: env::get_parsed(EnvKey::QueuePollTimeoutSecs, 5),
            minio_url: normalize_endpoint(&endpoint, secure),
            minio_region: env::get_or(EnvKey::MinioRegion, "us-east-1"),
            minio_access_key: required(EnvKey::MinioAccessKey)?,
            minio_secret_key: required(EnvKey::MinioSecretKey)?,
            input_bucket: env::get_or(EnvKey::InputBucket, "raw-videos"),
            output_bucket: env::get_or(EnvKey::OutputBucket, "processed-videos"),
            scratch_dir: env::get(EnvKey::ScratchDir)
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg"),
            transcode_timeout_secs: env::get_optional(EnvKey::TranscodeTimeoutSecs),
            retry_delay_secs: env::get_parsed(EnvKey::RetryDelaySecs, 5),
            log_format: parse_log_format(&env::get_or(EnvKey::LogFormat, "pretty")),
        })
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn transcode_timeout(&self) -> Option<Duration> {
        self.transcode_timeout_secs.map(Duration::from_secs)
    }
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get(key).map_err(|_| ConfigError::Missing(name))
}

/// MinIO endpoints are often configured as bare `host:port`.
pub fn normalize_endpoint(endpoint: &str, secure: bool) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else if secure {
        format!("https://{}", endpoint)
    } else {
        format!("http://{}", endpoint)
    }
}

fn parse_log_format(value: &str) -> LogFormat {
    match value.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}
