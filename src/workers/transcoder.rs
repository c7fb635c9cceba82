use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::common::error::JobError;
use crate::infrastructure::queue::JobQueue;
use crate::modules::transcode::pipeline::{PipelineOutcome, TaskPipeline};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub succeeded: u64,
    pub failed: u64,
    /// Payloads that never decoded into a job.
    pub dropped: u64,
    pub infrastructure_errors: u64,
}

impl WorkerStats {
    fn record(&mut self, outcome: &PipelineOutcome) {
        match &outcome.result {
            Ok(_) => self.succeeded += 1,
            Err(JobError::MalformedPayload(_)) => self.dropped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Runs jobs one at a time until `shutdown` is cancelled.
///
/// The stop signal is only honoured between jobs and while backing off; a
/// job that has been popped always runs to its verdict. Queue and storage
/// client failures are retried after `retry_delay`. Job failures never are.
pub async fn start_transcoder_worker<Q: JobQueue>(
    queue: &mut Q,
    pipeline: &TaskPipeline,
    retry_delay: Duration,
    shutdown: CancellationToken,
) -> WorkerStats {
    info!("Starting Transcoder Worker...");
    let mut stats = WorkerStats::default();

    loop {
        if shutdown.is_cancelled() {
            return stats;
        }
        match pipeline.ensure_output_bucket().await {
            Ok(()) => break,
            Err(e) => {
                stats.infrastructure_errors += 1;
                error!(
                    bucket = %pipeline.settings().output_bucket,
                    "Output bucket not ready: {}", e
                );
                if !back_off(retry_delay, &shutdown).await {
                    return stats;
                }
            }
        }
    }

    info!("Transcoder Worker waiting for jobs");

    while !shutdown.is_cancelled() {
        let payload = match queue.pop().await {
            Ok(Some(payload)) => payload,
            Ok(None) => continue,
            Err(e) => {
                stats.infrastructure_errors += 1;
                error!("Queue unavailable: {}. Retrying in {:?}", e, retry_delay);
                if !back_off(retry_delay, &shutdown).await {
                    break;
                }
                continue;
            }
        };

        info!("Received transcoding job ({} bytes)", payload.len());

        match AssertUnwindSafe(pipeline.process_payload(&payload))
            .catch_unwind()
            .await
        {
            Ok(outcome) => stats.record(&outcome),
            Err(panic) => {
                stats.failed += 1;
                error!("Job aborted by panic: {}", panic_message(panic.as_ref()));
            }
        }
    }

    info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        dropped = stats.dropped,
        infrastructure_errors = stats.infrastructure_errors,
        "Transcoder Worker stopped"
    );
    stats
}

/// Returns `false` if shutdown was requested while waiting.
async fn back_off(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.cancelled() => false,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use crate::infrastructure::transcoder::EncodeProfile;
    use crate::modules::transcode::pipeline::PipelineSettings;
    use crate::modules::transcode::testing::{
        FakeTranscoder, MemoryStore, QueueEvent, ScriptedQueue, scratch_is_empty,
    };

    const GOOD: &str = r#"{"task_id":"t1","input_path":"raw-videos/a.mp4"}"#;
    const RETRY: Duration = Duration::from_millis(1);

    fn pipeline(store: Arc<MemoryStore>, transcoder: FakeTranscoder, scratch: &std::path::Path) -> TaskPipeline {
        TaskPipeline::new(
            store,
            Arc::new(transcoder),
            PipelineSettings {
                input_bucket: "raw-videos".to_string(),
                output_bucket: "processed-videos".to_string(),
                scratch_dir: scratch.to_path_buf(),
                profile: EncodeProfile::STANDARD,
            },
        )
    }

    fn source_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_object("raw-videos", "a.mp4", b"video bytes"))
    }

    #[tokio::test]
    async fn runs_jobs_until_shutdown() {
        let scratch = tempfile::tempdir().unwrap();
        let store = source_store();
        let pipeline = pipeline(store.clone(), FakeTranscoder::working(), scratch.path());
        let shutdown = CancellationToken::new();
        let mut queue = ScriptedQueue::new(
            vec![QueueEvent::Payload(GOOD), QueueEvent::Empty, QueueEvent::Payload(GOOD)],
            shutdown.clone(),
        );

        let stats = start_transcoder_worker(&mut queue, &pipeline, RETRY, shutdown).await;

        assert_eq!(stats.succeeded, 2);
        assert_eq!(queue.pops, 3);
        assert_eq!(store.keys_in("processed-videos"), vec!["processed_a.mp4"]);
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn bad_jobs_do_not_stop_the_loop() {
        let scratch = tempfile::tempdir().unwrap();
        let store = source_store();
        let pipeline = pipeline(
            store.clone(),
            FakeTranscoder::failing_when(|call| call == 0),
            scratch.path(),
        );
        let shutdown = CancellationToken::new();
        let mut queue = ScriptedQueue::new(
            vec![
                QueueEvent::Payload("{not json"),
                QueueEvent::Payload(r#"{"task_id":"t0"}"#),
                QueueEvent::Payload(GOOD),
                QueueEvent::Payload(GOOD),
            ],
            shutdown.clone(),
        );

        let stats = start_transcoder_worker(&mut queue, &pipeline, RETRY, shutdown).await;

        assert_eq!(
            stats,
            WorkerStats {
                succeeded: 1,
                failed: 1,
                dropped: 2,
                infrastructure_errors: 0,
            }
        );
        // Dropped payloads never reached storage.
        let fetches = store.calls().iter().filter(|c| c.starts_with("fetch")).count();
        assert_eq!(fetches, 2);
    }

    #[tokio::test]
    async fn queue_outage_backs_off_and_resumes() {
        let scratch = tempfile::tempdir().unwrap();
        let pipeline = pipeline(source_store(), FakeTranscoder::working(), scratch.path());
        let shutdown = CancellationToken::new();
        let mut queue = ScriptedQueue::new(
            vec![QueueEvent::Outage, QueueEvent::Outage, QueueEvent::Payload(GOOD)],
            shutdown.clone(),
        );

        let stats = start_transcoder_worker(&mut queue, &pipeline, RETRY, shutdown).await;

        assert_eq!(stats.infrastructure_errors, 2);
        assert_eq!(stats.succeeded, 1);
    }

    #[tokio::test]
    async fn output_bucket_is_retried_before_consuming() {
        let scratch = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore {
            fail_bucket_checks: AtomicUsize::new(2),
            ..MemoryStore::with_object("raw-videos", "a.mp4", b"video bytes")
        });
        let pipeline = pipeline(store.clone(), FakeTranscoder::working(), scratch.path());
        let shutdown = CancellationToken::new();
        let mut queue = ScriptedQueue::new(vec![QueueEvent::Payload(GOOD)], shutdown.clone());

        let stats = start_transcoder_worker(&mut queue, &pipeline, RETRY, shutdown).await;

        assert_eq!(stats.infrastructure_errors, 2);
        assert_eq!(stats.succeeded, 1);
        assert!(store.calls().contains(&"create_bucket processed-videos".to_string()));
    }

    #[tokio::test]
    async fn cancelled_before_start_pops_nothing() {
        let scratch = tempfile::tempdir().unwrap();
        let pipeline = pipeline(source_store(), FakeTranscoder::working(), scratch.path());
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let mut queue = ScriptedQueue::new(vec![QueueEvent::Payload(GOOD)], shutdown.clone());

        let stats = start_transcoder_worker(&mut queue, &pipeline, RETRY, shutdown).await;

        assert_eq!(stats, WorkerStats::default());
        assert_eq!(queue.pops, 0);
    }

    #[tokio::test]
    async fn panicking_job_is_contained() {
        let scratch = tempfile::tempdir().unwrap();
        let pipeline = pipeline(source_store(), FakeTranscoder::panicking(), scratch.path());
        let shutdown = CancellationToken::new();
        let mut queue = ScriptedQueue::new(
            vec![QueueEvent::Payload(GOOD), QueueEvent::Payload(GOOD)],
            shutdown.clone(),
        );

        let stats = start_transcoder_worker(&mut queue, &pipeline, RETRY, shutdown).await;

        assert_eq!(stats.failed, 2);
        assert_eq!(queue.pops, 2);
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn sustained_mixed_load_leaves_scratch_empty() {
        let scratch = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            source_store(),
            FakeTranscoder::failing_when(|call| call % 2 == 1),
            scratch.path(),
        );
        let shutdown = CancellationToken::new();
        let events = (0..20).map(|_| QueueEvent::Payload(GOOD)).collect();
        let mut queue = ScriptedQueue::new(events, shutdown.clone());

        let stats = start_transcoder_worker(&mut queue, &pipeline, RETRY, shutdown).await;

        assert_eq!(stats.succeeded, 10);
        assert_eq!(stats.failed, 10);
        assert!(scratch_is_empty(scratch.path()));
    }

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
