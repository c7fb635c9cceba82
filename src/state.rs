use std::sync::Arc;
use std::time::Duration;

use crate::config::settings::WorkerConfig;
use crate::infrastructure::queue::redis_list::RedisJobQueue;
use crate::infrastructure::redis::client::RedisService;
use crate::infrastructure::storage::s3::StorageService;
use crate::infrastructure::transcoder::EncodeProfile;
use crate::infrastructure::transcoder::ffmpeg::FfmpegTranscoder;
use crate::modules::transcode::pipeline::{PipelineSettings, TaskPipeline};

/// Process-wide client handles, opened once at startup and dropped at
/// shutdown.
#[derive(Clone)]
pub struct WorkerState {
    pub config: WorkerConfig,
    pub redis: RedisService,
    pub storage: Arc<StorageService>,
    pub transcoder: Arc<FfmpegTranscoder>,
}

impl WorkerState {
    pub fn new(config: WorkerConfig) -> Result<Self, redis::RedisError> {
        let redis = RedisService::new(&config.redis_url)?;
        let storage = StorageService::new(
            &config.minio_url,
            &config.minio_region,
            &config.minio_access_key,
            &config.minio_secret_key,
        );
        let transcoder =
            FfmpegTranscoder::new(config.ffmpeg_path.clone()).with_timeout(config.transcode_timeout());

        Ok(Self {
            config,
            redis,
            storage: Arc::new(storage),
            transcoder: Arc::new(transcoder),
        })
    }

    pub fn queue(&self) -> RedisJobQueue {
        RedisJobQueue::new(
            self.redis.clone(),
            &self.config.queue_name,
            Duration::from_secs(self.config.queue_poll_timeout_secs),
        )
    }

    pub fn pipeline(&self) -> TaskPipeline {
        TaskPipeline::new(
            self.storage.clone(),
            self.transcoder.clone(),
            PipelineSettings {
                input_bucket: self.config.input_bucket.clone(),
                output_bucket: self.config.output_bucket.clone(),
                scratch_dir: self.config.scratch_dir.clone(),
                profile: EncodeProfile::STANDARD,
            },
        )
    }
}
