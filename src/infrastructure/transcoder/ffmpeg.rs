//! ffmpeg-backed [`Transcoder`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use super::{TranscodeRequest, Transcoder};
use crate::common::error::TranscodeError;

#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    program: String,
    timeout: Option<Duration>,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Without a timeout a hung encoder blocks the worker indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves the encoder binary on `PATH`.
    pub fn locate(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }

    pub fn build_args(request: &TranscodeRequest) -> Vec<String> {
        let profile = &request.profile;
        vec![
            "-y".to_string(),
            "-i".to_string(),
            request.input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            profile.video_codec.to_string(),
            "-preset".to_string(),
            profile.preset.to_string(),
            "-crf".to_string(),
            profile.crf.to_string(),
            "-c:a".to_string(),
            profile.audio_codec.to_string(),
            "-b:a".to_string(),
            profile.audio_bitrate.to_string(),
            request.output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, request: &TranscodeRequest) -> Result<(), TranscodeError> {
        let args = Self::build_args(request);
        info!("Running encoder: {} {}", self.program, args.join(" "));

        // The encoder's own output never reaches the worker's log stream.
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(TranscodeError::Spawn)?;

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!("Encoder exceeded {}s, killing it", limit.as_secs());
                    let _ = child.kill().await;
                    return Err(TranscodeError::TimedOut(limit.as_secs()));
                }
            },
            None => child.wait().await,
        }
        .map_err(TranscodeError::Wait)?;

        if status.success() {
            Ok(())
        } else {
            Err(TranscodeError::Failed {
                exit_code: status.code(),
            })
        }
    }
}
