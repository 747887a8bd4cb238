//! HTTP server layer for BigMap.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   GET /map   POST /stitcher   GET /queue   GET /artifacts/...   │
//! │                                                                 │
//! │  ┌───────────────────────────┐  ┌───────────────────────────┐   │
//! │  │        handlers           │  │          routes           │   │
//! │  │ (normalize, enqueue, list)│  │ (CORS, tracing, ServeDir) │   │
//! │  └───────────────────────────┘  └───────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, map_handler, providers_handler, queue_handler, stitcher_handler, AppState,
    ErrorResponse, HealthResponse, JobResponse, MapQueryParams, MapResponse, MapTileResponse,
    ProviderResponse, ProvidersResponse, QueueQueryParams, QueueResponse, ARTIFACTS_PATH,
    DEFAULT_WINDOW, DEFAULT_ZOOM,
};
pub use routes::{create_router, RouterConfig};
