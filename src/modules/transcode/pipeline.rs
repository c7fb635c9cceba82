//! Fetch → transcode → publish → cleanup for a single job.
//!
//! Stages advance strictly forward. Whatever the verdict, every scratch file
//! the job acquired is released before the outcome is reported, and a cleanup
//! problem never changes that verdict.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{Instrument, debug, error, info, info_span, warn};

use super::job::JobDescriptor;
use super::scratch::ScratchFiles;
use crate::common::error::{InfrastructureError, JobError};
use crate::infrastructure::storage::ObjectStore;
use crate::infrastructure::transcoder::{EncodeProfile, TranscodeRequest, Transcoder};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Validated,
    Fetched,
    Transcoded,
    Published,
    CleanedUp,
    Succeeded,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::Fetched => "fetched",
            PipelineStage::Transcoded => "transcoded",
            PipelineStage::Published => "published",
            PipelineStage::CleanedUp => "cleaned_up",
            PipelineStage::Succeeded => "succeeded",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct PipelineOutcome {
    /// `None` when the payload could not be decoded far enough to know it.
    pub task_id: Option<String>,
    /// Last non-terminal stage reached.
    pub stage: PipelineStage,
    /// Published object as `bucket/key` on success.
    pub result: Result<String, JobError>,
    pub cleanup_failures: usize,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn terminal(&self) -> PipelineStage {
        if self.is_success() {
            PipelineStage::Succeeded
        } else {
            PipelineStage::Failed
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub input_bucket: String,
    pub output_bucket: String,
    pub scratch_dir: PathBuf,
    pub profile: EncodeProfile,
}

pub struct TaskPipeline {
    storage: Arc<dyn ObjectStore>,
    transcoder: Arc<dyn Transcoder>,
    settings: PipelineSettings,
}

impl TaskPipeline {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        transcoder: Arc<dyn Transcoder>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            storage,
            transcoder,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn ensure_output_bucket(&self) -> Result<(), InfrastructureError> {
        self.storage
            .ensure_bucket(&self.settings.output_bucket)
            .await?;
        Ok(())
    }

    /// Decodes and runs one raw queue payload. A payload that does not decode
    /// is dropped before any storage or encoder call.
    pub async fn process_payload(&self, payload: &[u8]) -> PipelineOutcome {
        match JobDescriptor::decode(payload) {
            Ok(job) => self.process(&job).await,
            Err(e) => {
                error!(error_kind = e.kind(), "Dropping job: {}", e);
                PipelineOutcome {
                    task_id: None,
                    stage: PipelineStage::Received,
                    result: Err(e),
                    cleanup_failures: 0,
                }
            }
        }
    }

    pub async fn process(&self, job: &JobDescriptor) -> PipelineOutcome {
        let started = Instant::now();
        let task_id = job.task_id.as_str();
        info!(
            task_id,
            "Processing job: {}/{}", job.source.bucket, job.source.key
        );

        let mut scratch = ScratchFiles::new(&self.settings.scratch_dir);
        let mut stage = PipelineStage::Validated;

        // Adapter lines (downloads, encoder command, uploads) inherit the task id.
        let result = self
            .execute(job, &mut scratch, &mut stage)
            .instrument(info_span!("job", task_id))
            .await;

        let cleanup_failures = scratch.release().await;
        for failure in &cleanup_failures {
            warn!(task_id, "Cleanup failed: {}", failure);
        }
        if result.is_ok() {
            advance(task_id, &mut stage, PipelineStage::CleanedUp);
        }

        let outcome = PipelineOutcome {
            task_id: Some(job.task_id.clone()),
            stage,
            result,
            cleanup_failures: cleanup_failures.len(),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let verdict = outcome.terminal();
        match &outcome.result {
            Ok(published) => info!(
                task_id,
                elapsed_ms,
                %verdict,
                "Job finished: saved {}", published
            ),
            Err(e) => error!(
                task_id,
                elapsed_ms,
                %verdict,
                error_kind = e.kind(),
                failed_after = %outcome.stage,
                "Job finished: {}", e
            ),
        }

        outcome
    }

    async fn execute(
        &self,
        job: &JobDescriptor,
        scratch: &mut ScratchFiles,
        stage: &mut PipelineStage,
    ) -> Result<String, JobError> {
        let task_id = job.task_id.as_str();
        let source = &job.source;

        if source.bucket != self.settings.input_bucket {
            warn!(
                task_id,
                "Expected bucket {}, got {}", self.settings.input_bucket, source.bucket
            );
        }

        let input = scratch.reserve(source.base_name());
        self.storage
            .fetch(&source.bucket, &source.key, &input)
            .await
            .map_err(JobError::Fetch)?;
        advance(task_id, stage, PipelineStage::Fetched);

        let output_key = source.output_key();
        let output = scratch.reserve(&output_key);
        let request = TranscodeRequest {
            input,
            output,
            profile: self.settings.profile,
        };
        self.transcoder.transcode(&request).await?;
        advance(task_id, stage, PipelineStage::Transcoded);

        let output_bucket = &self.settings.output_bucket;
        self.storage
            .publish(output_bucket, &output_key, &request.output)
            .await
            .map_err(JobError::Publish)?;
        advance(task_id, stage, PipelineStage::Published);

        Ok(format!("{}/{}", output_bucket, output_key))
    }
}

fn advance(task_id: &str, stage: &mut PipelineStage, next: PipelineStage) {
    debug!(task_id, from = %stage, to = %next, "Stage transition");
    *stage = next;
}
