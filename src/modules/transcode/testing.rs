//! In-memory collaborators for pipeline and worker tests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::common::error::{InfrastructureError, StorageError, StorageResult, TranscodeError};
use crate::infrastructure::queue::JobQueue;
use crate::infrastructure::storage::ObjectStore;
use crate::infrastructure::transcoder::{TranscodeRequest, Transcoder};

#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    pub buckets: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_fetch: bool,
    /// Write a partial file before failing the fetch.
    pub partial_fetch: bool,
    pub fail_publish: bool,
    pub fail_bucket_checks: AtomicUsize,
}

impl MemoryStore {
    pub fn with_object(bucket: &str, key: &str, data: &[u8]) -> Self {
        let store = Self::default();
        store.put(bucket, key, data);
        store
    }

    pub fn put(&self, bucket: &str, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), data.to_vec());
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys_in(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<()> {
        self.record(format!("fetch {}/{}", bucket, key));
        if self.partial_fetch {
            tokio::fs::write(dest, b"partial").await?;
            return Err(StorageError::DownloadFailed("connection reset".to_string()));
        }
        if self.fail_fetch {
            return Err(StorageError::DownloadFailed("access denied".to_string()));
        }
        let data = self
            .get(bucket, key)
            .ok_or_else(|| StorageError::not_found(bucket, key))?;
        tokio::fs::write(dest, data).await?;
        Ok(())
    }

    async fn publish(&self, bucket: &str, key: &str, src: &Path) -> StorageResult<()> {
        self.record(format!("publish {}/{}", bucket, key));
        if self.fail_publish {
            return Err(StorageError::UploadFailed("service unavailable".to_string()));
        }
        let data = tokio::fs::read(src).await?;
        self.put(bucket, key, &data);
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        self.record(format!("bucket_exists {}", bucket));
        let remaining = self.fail_bucket_checks.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_bucket_checks.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::BucketFailed("connection refused".to_string()));
        }
        Ok(self.buckets.lock().unwrap().iter().any(|b| b == bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.record(format!("create_bucket {}", bucket));
        self.buckets.lock().unwrap().push(bucket.to_string());
        Ok(())
    }
}

/// Copies input to output, or fails according to `fail_when`.
pub struct FakeTranscoder {
    pub calls: AtomicUsize,
    fail_when: Box<dyn Fn(usize) -> bool + Send + Sync>,
    panic_on_call: bool,
}

impl FakeTranscoder {
    pub fn working() -> Self {
        Self::failing_when(|_| false)
    }

    pub fn broken() -> Self {
        Self::failing_when(|_| true)
    }

    pub fn failing_when(predicate: impl Fn(usize) -> bool + Send + Sync + 'static) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_when: Box::new(predicate),
            panic_on_call: false,
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic_on_call: true,
            ..Self::working()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, request: &TranscodeRequest) -> Result<(), TranscodeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_call {
            panic!("encoder crashed");
        }
        // A real encoder usually leaves a truncated output behind on failure.
        let data = tokio::fs::read(&request.input).await.map_err(TranscodeError::Wait)?;
        tokio::fs::write(&request.output, &data)
            .await
            .map_err(TranscodeError::Wait)?;
        if (self.fail_when)(call) {
            return Err(TranscodeError::Failed { exit_code: Some(1) });
        }
        Ok(())
    }
}

pub enum QueueEvent {
    Payload(&'static str),
    Empty,
    Outage,
}

/// Replays scripted events, then trips `shutdown` once drained.
pub struct ScriptedQueue {
    events: VecDeque<QueueEvent>,
    shutdown: CancellationToken,
    pub pops: usize,
}

impl ScriptedQueue {
    pub fn new(events: Vec<QueueEvent>, shutdown: CancellationToken) -> Self {
        Self {
            events: events.into(),
            shutdown,
            pops: 0,
        }
    }
}

#[async_trait]
impl JobQueue for ScriptedQueue {
    async fn pop(&mut self) -> Result<Option<Vec<u8>>, InfrastructureError> {
        self.pops += 1;
        let event = self.events.pop_front();
        if self.events.is_empty() {
            self.shutdown.cancel();
        }
        match event {
            Some(QueueEvent::Payload(p)) => Ok(Some(p.as_bytes().to_vec())),
            Some(QueueEvent::Empty) | None => Ok(None),
            Some(QueueEvent::Outage) => Err(InfrastructureError::Queue(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection dropped",
            )))),
        }
    }
}

pub fn scratch_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
}
