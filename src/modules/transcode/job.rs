use std::path::Path;

use serde::Deserialize;
use validator::Validate;

use crate::common::error::JobError;
use crate::infrastructure::transcoder::EncodeProfile;

pub const OUTPUT_PREFIX: &str = "processed_";

/// Wire shape of a queue payload. Fields are optional here so that a missing
/// field is reported by validation rather than as a generic decode error.
#[derive(Debug, Deserialize, Validate)]
struct JobPayload {
    #[validate(required, length(min = 1))]
    task_id: Option<String>,
    #[validate(required, length(min = 1))]
    input_path: Option<String>,
}

/// A decoded, validated job. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Opaque; only ever used to correlate log lines.
    pub task_id: String,
    pub source: ObjectLocation,
}

/// `<bucket>/<key>`, split on the first separator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn parse(input_path: &str) -> Result<Self, JobError> {
        let (bucket, key) = input_path.split_once('/').ok_or_else(|| {
            JobError::malformed(format!("input_path '{}' is not of the form bucket/key", input_path))
        })?;

        if bucket.is_empty() || key.is_empty() {
            return Err(JobError::malformed(format!(
                "input_path '{}' has an empty bucket or key",
                input_path
            )));
        }

        let location = Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        };

        if location.base_name().is_empty() {
            return Err(JobError::malformed(format!(
                "input_path '{}' does not name a file",
                input_path
            )));
        }

        Ok(location)
    }

    /// Last path segment of the key.
    pub fn base_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or_default()
    }

    /// Published name for this source: fixed prefix, source stem, fixed
    /// extension. The source container plays no part.
    pub fn output_key(&self) -> String {
        let base = self.base_name();
        let stem = Path::new(base)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(base);
        format!("{}{}.{}", OUTPUT_PREFIX, stem, EncodeProfile::OUTPUT_EXTENSION)
    }
}

impl JobDescriptor {
    /// Decodes one queue payload. Pure: nothing is touched on failure.
    pub fn decode(payload: &[u8]) -> Result<Self, JobError> {
        let raw: JobPayload = serde_json::from_slice(payload)
            .map_err(|e| JobError::malformed(format!("payload is not a job object: {}", e)))?;

        raw.validate()
            .map_err(|e| JobError::malformed(format!("invalid job fields: {}", e)))?;

        let (Some(task_id), Some(input_path)) = (raw.task_id, raw.input_path) else {
            return Err(JobError::malformed("task_id and input_path are required"));
        };

        let source = ObjectLocation::parse(&input_path)?;

        Ok(Self { task_id, source })
    }
}
