//! Durable job store.
//!
//! [`JobStore`] is the key-value abstraction the queue runs on: one record and
//! at most one image artifact per job id. [`FileJobStore`] implements it with
//! one JSON file per job in a single directory:
//!
//! ```text
//! queue/
//! ├── 0001760870400123-000000-5f0c9e1b7d24.json   (record)
//! ├── 0001760870400123-000000-5f0c9e1b7d24.png    (artifact, once done)
//! └── 0001760870400456-000001-0a1b2c3d4e5f.json
//! ```
//!
//! Every write goes to a sibling `.tmp` file first and is then renamed over
//! the target, so readers never observe a half-written record or image.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::StoreError;

use super::job::{Job, JobId, StitchParams};

/// Default timeout for a single record or artifact write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(60);

const RECORD_EXTENSION: &str = "json";
const ARTIFACT_EXTENSION: &str = "png";
const TEMP_SUFFIX: &str = ".tmp";

// =============================================================================
// JobStore Trait
// =============================================================================

/// Persistence for job records and their output images.
///
/// Implementations must make `update` and `write_artifact` atomic replaces and
/// must tolerate concurrent calls for distinct ids.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Persist a fresh `NEW` job for `params`.
    async fn create(&self, params: StitchParams) -> Result<Job, StoreError>;

    /// All readable job records, ordered by id. Unreadable records are skipped.
    async fn list(&self) -> Result<Vec<Job>, StoreError>;

    /// A single job record, or `None` if it does not exist.
    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError>;

    /// Overwrite the record for `job.id`.
    async fn update(&self, job: &Job) -> Result<(), StoreError>;

    /// Remove the record and artifact. Missing files are not an error.
    async fn delete(&self, id: &JobId) -> Result<(), StoreError>;

    /// Persist the output image for `id`.
    async fn write_artifact(&self, id: &JobId, data: Bytes) -> Result<(), StoreError>;

    /// Name under which the artifact for `id` is stored and served.
    fn artifact_name(&self, id: &JobId) -> String {
        format!("{}.{}", id, ARTIFACT_EXTENSION)
    }
}

// =============================================================================
// File Store
// =============================================================================

/// File-per-job implementation of [`JobStore`].
#[derive(Debug, Clone)]
pub struct FileJobStore {
    dir: PathBuf,
    write_timeout: Duration,
}

impl FileJobStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        debug!(dir = %dir.display(), "Opening job store");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        Ok(Self {
            dir,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        })
    }

    /// Set the timeout applied to each write.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Directory holding records and artifacts.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `id`.
    pub fn record_path(&self, id: &JobId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, RECORD_EXTENSION))
    }

    /// Path of the artifact file for `id`.
    pub fn artifact_path(&self, id: &JobId) -> PathBuf {
        self.dir.join(self.artifact_name(id))
    }

    /// Write `data` to `path` through a temporary sibling and a rename.
    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);

        let write = async {
            tokio::fs::write(&temp_path, data)
                .await
                .map_err(|e| StoreError::io(&temp_path, e))?;
            tokio::fs::rename(&temp_path, path)
                .await
                .map_err(|e| StoreError::io(path, e))
        };

        let result = match tokio::time::timeout(self.write_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(path.display().to_string())),
        };

        if result.is_err() {
            let _ = tokio::fs::remove_file(&temp_path).await;
        }
        result
    }

    async fn read_record(path: &Path) -> Result<Job, StoreError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| StoreError::io(path, e))?;

        serde_json::from_slice(&data).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create(&self, params: StitchParams) -> Result<Job, StoreError> {
        let job = Job::new(params);
        self.update(&job).await?;
        debug!(job_id = %job.id, "Created job");
        Ok(job)
    }

    async fn list(&self) -> Result<Vec<Job>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        let mut jobs = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), "Error reading queue directory: {}", e);
                    break;
                }
            };

            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            match Self::read_record(&path).await {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    // Records deleted since read_dir are skipped silently
                    if tokio::fs::metadata(&path).await.is_ok() {
                        warn!("Skipping job record: {}", e);
                    }
                }
            }
        }

        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        let path = self.record_path(id);
        match tokio::fs::metadata(&path).await {
            Ok(_) => Self::read_record(&path).await.map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    async fn update(&self, job: &Job) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(job).map_err(|e| StoreError::Serialize {
            id: job.id.to_string(),
            message: e.to_string(),
        })?;
        self.write_atomic(&self.record_path(&job.id), &json).await
    }

    async fn delete(&self, id: &JobId) -> Result<(), StoreError> {
        Self::remove_if_exists(&self.record_path(id)).await?;
        Self::remove_if_exists(&self.artifact_path(id)).await
    }

    async fn write_artifact(&self, id: &JobId, data: Bytes) -> Result<(), StoreError> {
        self.write_atomic(&self.artifact_path(id), &data).await
    }
}

// =============================================================================
// Tests
// =============================================================================
