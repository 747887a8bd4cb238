//! # BigMap
//!
//! Stitch tiles from web map tile providers into single large raster images.
//!
//! Clients describe a rectangular window of tiles at one zoom level. The
//! window is normalized against the provider's bounds, persisted as a job and
//! processed in the background: every tile is fetched, composited onto one
//! canvas and written out as a PNG. Jobs and images expire after a retention
//! period.
//!
//! ## Architecture
//!
//! - [`tile`] - Window normalization, tile addressing, fetching and compositing
//! - [`provider`] - Provider definitions and the immutable registry
//! - [`queue`] - Job records, the job store, the stitch worker and the monitor
//! - [`server`] - Axum-based HTTP API
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bigmap::{
//!     FileJobStore, HttpTileFetcher, MonitorConfig, ProviderRegistry, QueueMonitor, StitchQueue,
//!     StitchWorker, WorkerConfig, DEFAULT_FETCH_TIMEOUT,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let providers = Arc::new(ProviderRegistry::load("providers.json")?);
//!     let store = Arc::new(FileJobStore::open("queue").await?);
//!     let fetcher = Arc::new(HttpTileFetcher::new(DEFAULT_FETCH_TIMEOUT)?);
//!
//!     let worker = StitchWorker::new(Arc::clone(&store), fetcher, WorkerConfig::default());
//!     let monitor = QueueMonitor::new(Arc::clone(&store), worker, MonitorConfig::default());
//!     let shutdown = CancellationToken::new();
//!     monitor.spawn(shutdown.clone());
//!
//!     let queue = StitchQueue::new(store);
//!     let provider = providers.default_provider().clone();
//!     let window = bigmap::normalize(bigmap::WindowRequest::new(3, 1, 1, 3, 3), 0, 18);
//!     let job = queue
//!         .enqueue(bigmap::StitchParams::new(window, provider.scale, provider))
//!         .await?;
//!     println!("queued {}", job.id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod queue;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use config::Config;
pub use error::{ApiError, FetchError, ProviderError, StitchError, StoreError};
pub use provider::{Provider, ProviderDefinition, ProviderRegistry, MAX_SUPPORTED_ZOOM};
pub use queue::{
    FileJobStore, Job, JobId, JobState, JobStore, MonitorConfig, MonitorReport, QueueMonitor,
    StitchParams, StitchQueue, StitchSummary, StitchWorker, WorkerConfig,
};
pub use server::{create_router, AppState, RouterConfig};
pub use tile::{
    decode_tile, normalize, resolve_tiles, tile_url, Canvas, HttpTileFetcher, Navigation,
    TileAddress, TileFetcher, TileWindow, WindowRequest, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_MAX_CANVAS_DIMENSION,
};
