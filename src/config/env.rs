use std::env;
use std::str::FromStr;

pub enum EnvKey {
    RedisUrl,
    QueueName,
    QueuePollTimeoutSecs,
    MinioUrl,
    MinioSecure,
    MinioRegion,
    MinioAccessKey,
    MinioSecretKey,
    InputBucket,
    OutputBucket,
    ScratchDir,
    FfmpegPath,
    TranscodeTimeoutSecs,
    RetryDelaySecs,
    LogFormat,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::QueueName => "QUEUE_NAME",
            EnvKey::QueuePollTimeoutSecs => "QUEUE_POLL_TIMEOUT_SECS",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioSecure => "MINIO_SECURE",
            EnvKey::MinioRegion => "MINIO_REGION",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::InputBucket => "INPUT_BUCKET",
            EnvKey::OutputBucket => "OUTPUT_BUCKET",
            EnvKey::ScratchDir => "SCRATCH_DIR",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::TranscodeTimeoutSecs => "TRANSCODE_TIMEOUT_SECS",
            EnvKey::RetryDelaySecs => "RETRY_DELAY_SECS",
            EnvKey::LogFormat => "LOG_FORMAT",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

pub fn get_optional<T: FromStr>(key: EnvKey) -> Option<T> {
    get(key).ok().and_then(|val| val.parse::<T>().ok())
}
