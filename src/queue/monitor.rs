//! Queue monitor.
//!
//! A single background task that periodically sweeps the store:
//!
//! 1. every job older than the retention period is deleted, whatever its state;
//! 2. every remaining `NEW` job is handed to the [`StitchWorker`], with at most
//!    `max_concurrent_jobs` in flight.
//!
//! An iteration finishes all of its jobs before the next one starts, so a job
//! is never picked up twice concurrently by the same monitor.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::tile::TileFetcher;

use super::job::JobState;
use super::store::JobStore;
use super::worker::StitchWorker;

/// Default time between sweeps.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Default age after which jobs and artifacts are removed.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Default number of jobs processed in parallel.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;

/// Monitor tuning.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub retention: Duration,
    pub max_concurrent_jobs: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_MONITOR_INTERVAL,
            retention: DEFAULT_RETENTION,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorReport {
    /// Jobs removed for exceeding the retention period
    pub expired: usize,
    /// Jobs that finished as `DONE`
    pub processed: usize,
    /// Jobs that finished as `ERROR`
    pub failed: usize,
}

/// Periodic expiry and dispatch loop.
pub struct QueueMonitor<S, F> {
    store: Arc<S>,
    worker: StitchWorker<S, F>,
    config: MonitorConfig,
}

impl<S, F> QueueMonitor<S, F>
where
    S: JobStore,
    F: TileFetcher + 'static,
{
    pub fn new(store: Arc<S>, worker: StitchWorker<S, F>, config: MonitorConfig) -> Self {
        Self {
            store,
            worker,
            config,
        }
    }

    /// Run sweeps every `interval` until `shutdown` is cancelled.
    ///
    /// A sweep in progress is allowed to finish.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            retention_secs = self.config.retention.as_secs(),
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "Queue monitor started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) if report != MonitorReport::default() => {
                            info!(
                                expired = report.expired,
                                processed = report.processed,
                                failed = report.failed,
                                "Queue sweep"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!("Queue sweep failed: {}", e),
                    }
                }
            }
        }

        info!("Queue monitor stopped");
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Perform a single sweep.
    pub async fn run_once(&self) -> Result<MonitorReport, StoreError> {
        self.run_once_at(Utc::now()).await
    }

    /// Perform a single sweep as if the current time were `now`.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> Result<MonitorReport, StoreError> {
        let mut report = MonitorReport::default();
        let mut pending = Vec::new();

        for job in self.store.list().await? {
            if job.is_expired(now, self.config.retention) {
                match self.store.delete(&job.id).await {
                    Ok(()) => {
                        debug!(job_id = %job.id, state = %job.state, "Expired job");
                        report.expired += 1;
                    }
                    Err(e) => warn!(job_id = %job.id, "Failed to expire job: {}", e),
                }
            } else if job.state == JobState::New {
                pending.push(job);
            }
        }

        if pending.is_empty() {
            return Ok(report);
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));
        let mut tasks = JoinSet::new();

        for job in pending {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let worker = self.worker.clone();

            tasks.spawn(async move {
                let _permit = permit;
                worker.run(job).await.state
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(JobState::Done) => report.processed += 1,
                Ok(_) => report.failed += 1,
                Err(e) => {
                    error!("Stitch task panicked: {}", e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

// =============================================================================
// Tests
// =============================================================================
