//! Stitch worker.
//!
//! Turns one `NEW` job into a finished artifact:
//!
//! ```text
//! params ──▶ canvas ──▶ resolve ──▶ fetch (bounded, timed) + composite ──▶ PNG ──▶ store
//!              │                              │
//!              │ too large                    │ failed tile
//!              ▼                              ▼
//!            ERROR                      warn + leave gap
//! ```
//!
//! Individual tiles never fail a job. Only canvas allocation, encoding and
//! persisting the artifact do.

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::{FetchError, StitchError};
use crate::tile::{
    decode_tile, iter_tiles, Canvas, TileAddress, TileFetcher, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_MAX_CANVAS_DIMENSION,
};

use super::job::{Job, StitchSummary};
use super::store::JobStore;

/// Default number of tiles fetched in parallel for one job.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Worker tuning.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Tile fetches in flight per job
    pub max_concurrent_fetches: usize,

    /// Timeout for one tile fetch
    pub fetch_timeout: Duration,

    /// Largest allowed canvas width or height in pixels
    pub max_canvas_dimension: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_canvas_dimension: DEFAULT_MAX_CANVAS_DIMENSION,
        }
    }
}

impl WorkerConfig {
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_canvas_dimension(mut self, max: u32) -> Self {
        self.max_canvas_dimension = max;
        self
    }
}

/// Processes stitch jobs against a store and a tile source.
pub struct StitchWorker<S, F> {
    store: Arc<S>,
    fetcher: Arc<F>,
    config: WorkerConfig,
}

impl<S, F> Clone for StitchWorker<S, F> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            fetcher: Arc::clone(&self.fetcher),
            config: self.config.clone(),
        }
    }
}

impl<S, F> StitchWorker<S, F>
where
    S: JobStore,
    F: TileFetcher + 'static,
{
    pub fn new(store: Arc<S>, fetcher: Arc<F>, config: WorkerConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Process `job` and persist its final state.
    ///
    /// Never fails: stitch errors become an `ERROR` record, and a failure to
    /// persist the final record is logged. The returned job carries the state
    /// that was (or should have been) written.
    pub async fn run(&self, mut job: Job) -> Job {
        match self.stitch(&job).await {
            Ok(summary) => {
                info!(
                    job_id = %job.id,
                    tiles_total = summary.tiles_total,
                    tiles_fetched = summary.tiles_fetched,
                    "Job done"
                );
                job.complete(summary);
            }
            Err(e) => {
                error!(job_id = %job.id, "Job failed: {}", e);
                job.fail(e.to_string());
            }
        }

        if let Err(e) = self.store.update(&job).await {
            error!(job_id = %job.id, state = %job.state, "Failed to persist job state: {}", e);
        }

        job
    }

    /// Stitch the artifact for `job` without touching its record.
    pub async fn stitch(&self, job: &Job) -> Result<StitchSummary, StitchError> {
        let params = &job.params;
        let window = params.window();

        let mut canvas = Canvas::new(
            window.width_tiles(),
            window.height_tiles(),
            params.scale,
            self.config.max_canvas_dimension,
        )?;

        let tiles_total = window.tile_count();
        debug!(
            job_id = %job.id,
            provider = %params.provider.name,
            zoom = params.zoom,
            tiles = tiles_total,
            "Stitching"
        );

        let tiles_fetched = self
            .fetch_tiles(iter_tiles(&window, &params.provider), &mut canvas)
            .await;

        let png = tokio::task::spawn_blocking(move || canvas.encode_png())
            .await
            .map_err(|e| StitchError::Encode {
                message: format!("Encoding task failed: {}", e),
            })??;

        self.store.write_artifact(&job.id, png).await?;

        Ok(StitchSummary {
            tiles_total,
            tiles_fetched,
        })
    }

    /// Fetch and decode tiles, compositing each one as it arrives.
    ///
    /// At most `max_concurrent_fetches` tiles are in flight or waiting to be
    /// placed. Cells never overlap, so completion order does not change the
    /// result. Returns the number of tiles placed.
    async fn fetch_tiles(
        &self,
        addresses: impl Iterator<Item = TileAddress>,
        canvas: &mut Canvas,
    ) -> u64 {
        let limit = self.config.max_concurrent_fetches.max(1);
        let mut tasks = JoinSet::new();
        let mut placed = 0;

        for address in addresses {
            while tasks.len() >= limit {
                match tasks.join_next().await {
                    Some(joined) => placed += place_tile(canvas, joined),
                    None => break,
                }
            }

            let fetcher = Arc::clone(&self.fetcher);
            let timeout = self.config.fetch_timeout;
            tasks.spawn(async move {
                let result = fetch_tile(fetcher.as_ref(), &address.url, timeout).await;
                (address, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            placed += place_tile(canvas, joined);
        }

        placed
    }
}

async fn fetch_tile<F: TileFetcher + ?Sized>(
    fetcher: &F,
    url: &str,
    timeout: Duration,
) -> Result<RgbaImage, FetchError> {
    let data = match tokio::time::timeout(timeout, fetcher.fetch(url)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(FetchError::Timeout {
                url: url.to_string(),
            })
        }
    };

    decode_tile(&data, url)
}

type TileResult = Result<(TileAddress, Result<RgbaImage, FetchError>), JoinError>;

/// Place one finished fetch on the canvas. Returns 1 if a tile was placed.
fn place_tile(canvas: &mut Canvas, joined: TileResult) -> u64 {
    match joined {
        Ok((address, Ok(image))) => {
            canvas.place(&image, address.left, address.top);
            1
        }
        Ok((_, Err(e))) => {
            warn!("Skipping tile: {}", e);
            0
        }
        Err(e) => {
            warn!("Tile task failed: {}", e);
            0
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
