//! Router configuration for BigMap.
//!
//! # Route Structure
//!
//! ```text
//! /health                  - Health check
//! /providers               - Configured providers
//! /map                     - Map view description
//! /stitcher       (POST)   - Enqueue a stitch job
//! /queue                   - Job statuses
//! /artifacts/{id}.png      - Stitched images (static, from the queue directory;
//!                            job records and temporary files are not served)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bigmap::server::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .with_artifacts_dir(store.dir())
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(providers, queue, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, map_handler, providers_handler, queue_handler, stitcher_handler, AppState,
    ARTIFACTS_PATH,
};
use crate::provider::ProviderRegistry;
use crate::queue::{JobId, JobStore, StitchQueue};
use crate::tile::DEFAULT_MAX_CANVAS_DIMENSION;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Directory served under `/artifacts` (None = no artifact route)
    pub artifacts_dir: Option<PathBuf>,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Largest canvas width or height a request may describe
    pub max_canvas_dimension: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - No artifact directory is served
    /// - CORS allows any origin
    /// - Tracing is enabled
    /// - Canvases up to [`DEFAULT_MAX_CANVAS_DIMENSION`] are accepted
    pub fn new() -> Self {
        Self {
            artifacts_dir: None,
            cors_origins: None,
            enable_tracing: true,
            max_canvas_dimension: DEFAULT_MAX_CANVAS_DIMENSION,
        }
    }

    /// Serve stitched images from `dir` under `/artifacts`.
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(dir.into());
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Reject map and stitch requests whose canvas would exceed `max` pixels.
    pub fn with_max_canvas_dimension(mut self, max: u32) -> Self {
        self.max_canvas_dimension = max;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `providers` - Immutable provider configuration
/// * `queue` - Job queue the handlers enqueue into and read from
/// * `config` - Router configuration
pub fn create_router<S>(
    providers: Arc<ProviderRegistry>,
    queue: StitchQueue<S>,
    config: RouterConfig,
) -> Router
where
    S: JobStore,
{
    let app_state =
        AppState::new(providers, queue).with_max_canvas_dimension(config.max_canvas_dimension);
    let cors = build_cors_layer(&config);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/providers", get(providers_handler::<S>))
        .route("/map", get(map_handler::<S>))
        .route("/stitcher", post(stitcher_handler::<S>))
        .route("/queue", get(queue_handler::<S>))
        .with_state(app_state);

    if let Some(dir) = &config.artifacts_dir {
        let artifacts = Router::new()
            .fallback_service(ServeDir::new(dir))
            .layer(middleware::from_fn(artifacts_only));
        router = router.nest_service(ARTIFACTS_PATH, artifacts);
    }

    let router = router.layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Let only `<job id>.png` through to the artifact directory.
async fn artifacts_only(request: Request, next: Next) -> Response {
    let name = request.uri().path().trim_start_matches('/');
    if is_artifact_name(name) {
        next.run(request).await
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

fn is_artifact_name(name: &str) -> bool {
    name.strip_suffix(".png").is_some_and(|id| id.parse::<JobId>().is_ok())
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
