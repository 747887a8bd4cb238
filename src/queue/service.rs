//! Public queue facade used by request handlers.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::StoreError;

use super::job::{Job, JobId, StitchParams};
use super::store::JobStore;

/// Enqueue and query stitch jobs.
///
/// Handlers only ever create and read jobs. Processing happens in the
/// [`QueueMonitor`](super::QueueMonitor) against the same store.
pub struct StitchQueue<S> {
    store: Arc<S>,
}

impl<S> Clone for StitchQueue<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: JobStore> StitchQueue<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Persist a new job and return it in state `NEW`.
    pub async fn enqueue(&self, params: StitchParams) -> Result<Job, StoreError> {
        let job = self.store.create(params).await?;
        info!(
            job_id = %job.id,
            provider = %job.params.provider.name,
            zoom = job.params.zoom,
            tiles = job.params.window().tile_count(),
            "Enqueued stitch job"
        );
        Ok(job)
    }

    /// List jobs in creation order, optionally restricted to one id.
    ///
    /// An unreadable record is skipped in both cases.
    pub async fn list(&self, filter: Option<&JobId>) -> Result<Vec<Job>, StoreError> {
        let id = match filter {
            Some(id) => id,
            None => return self.store.list().await,
        };

        match self.store.get(id).await {
            Ok(job) => Ok(job.into_iter().collect()),
            Err(e @ StoreError::Corrupt { .. }) => {
                warn!(job_id = %id, "Skipping job record: {}", e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Look up a single job.
    pub async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        self.store.get(id).await
    }

    /// Name under which the artifact for `id` is served.
    pub fn artifact_name(&self, id: &JobId) -> String {
        self.store.artifact_name(id)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
