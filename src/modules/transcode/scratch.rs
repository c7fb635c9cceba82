use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::common::error::CleanupError;

/// Local temporary files owned by one job.
///
/// Paths are registered *before* the step that creates them, so a step that
/// fails halfway still has its partial artifact removed by [`release`].
///
/// [`release`]: ScratchFiles::release
#[derive(Debug)]
pub struct ScratchFiles {
    dir: PathBuf,
    token: String,
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            token: Uuid::new_v4().simple().to_string(),
            paths: Vec::new(),
        }
    }

    /// Reserves a job-unique path for `file_name` and tracks it for removal.
    pub fn reserve(&mut self, file_name: &str) -> PathBuf {
        let path = self.dir.join(format!("{}_{}", self.token, file_name));
        self.paths.push(path.clone());
        path
    }

    /// Removes every tracked path. A path that never materialized is not an
    /// error; anything else is returned for logging.
    pub async fn release(mut self) -> Vec<CleanupError> {
        let mut failures = Vec::new();
        for path in std::mem::take(&mut self.paths) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Nothing to remove at {}", path.display())
                }
                Err(source) => failures.push(CleanupError { path, source }),
            }
        }
        failures
    }
}

// Only reached with paths still tracked when a job unwinds before release.
impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            let _ = std::fs::remove_file(&path);
        }
    }
}
