pub mod ffmpeg;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::common::error::TranscodeError;

/// Fixed quality/codec settings applied to every job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeProfile {
    pub video_codec: &'static str,
    pub preset: &'static str,
    pub crf: u8,
    pub audio_codec: &'static str,
    pub audio_bitrate: &'static str,
}

impl EncodeProfile {
    /// H.264 + AAC in an MP4 container.
    pub const STANDARD: EncodeProfile = EncodeProfile {
        video_codec: "libx264",
        preset: "fast",
        crf: 23,
        audio_codec: "aac",
        audio_bitrate: "128k",
    };

    pub const OUTPUT_EXTENSION: &'static str = "mp4";
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[derive(Clone, Debug)]
pub struct TranscodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub profile: EncodeProfile,
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Runs one encode to completion. Returns once the encoder has exited.
    async fn transcode(&self, request: &TranscodeRequest) -> Result<(), TranscodeError>;
}
