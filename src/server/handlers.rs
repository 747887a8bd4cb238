//! HTTP request handlers for the BigMap API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /providers` - Configured tile providers
//! - `GET /map` - Normalized window, tile list and navigation for a map view
//! - `POST /stitcher` - Enqueue a stitch job
//! - `GET /queue` - Job statuses, optionally for a single job

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ApiError, StoreError};
use crate::provider::{Provider, ProviderRegistry};
use crate::queue::{Job, JobId, JobState, JobStore, StitchParams, StitchQueue, StitchSummary};
use crate::tile::{
    normalize, resolve_tiles, Navigation, TileWindow, WindowRequest,
    DEFAULT_MAX_CANVAS_DIMENSION,
};

/// Zoom used when a request does not name one.
pub const DEFAULT_ZOOM: i64 = 3;

/// Window used when a request does not name one.
pub const DEFAULT_WINDOW: (i64, i64, i64, i64) = (1, 1, 3, 3);

/// URL prefix under which artifacts are served.
pub const ARTIFACTS_PATH: &str = "/artifacts";

/// Largest number of tiles a map view lists.
pub const MAX_MAP_TILES: u64 = 4096;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S> {
    /// Immutable provider configuration
    pub providers: Arc<ProviderRegistry>,

    /// Job queue backed by the shared store
    pub queue: StitchQueue<S>,

    /// Largest canvas width or height a request may describe
    pub max_canvas_dimension: u32,
}

impl<S: JobStore> AppState<S> {
    pub fn new(providers: Arc<ProviderRegistry>, queue: StitchQueue<S>) -> Self {
        Self {
            providers,
            queue,
            max_canvas_dimension: DEFAULT_MAX_CANVAS_DIMENSION,
        }
    }

    pub fn with_max_canvas_dimension(mut self, max: u32) -> Self {
        self.max_canvas_dimension = max;
        self
    }

    /// Resolve the provider, window and scale a request describes.
    ///
    /// Missing values fall back to defaults; out-of-range values are
    /// normalized. An unknown provider, a zero scale or a window whose
    /// canvas would exceed `max_canvas_dimension` is rejected.
    fn resolve(&self, query: &MapQueryParams) -> Result<(Provider, TileWindow, u32), ApiError> {
        let provider = match &query.provider {
            Some(name) => self
                .providers
                .get(name)
                .ok_or_else(|| ApiError::UnknownProvider(name.clone()))?,
            None => self.providers.default_provider(),
        };

        let scale = query.scale.unwrap_or(provider.scale);
        if scale == 0 {
            return Err(ApiError::InvalidScale(scale));
        }

        let (xmin, ymin, xmax, ymax) = DEFAULT_WINDOW;
        let request = WindowRequest::new(
            query.zoom.unwrap_or(DEFAULT_ZOOM),
            query.xmin.unwrap_or(xmin),
            query.ymin.unwrap_or(ymin),
            query.xmax.unwrap_or(xmax),
            query.ymax.unwrap_or(ymax),
        );
        let window = normalize(request, provider.min_zoom, provider.max_zoom);

        let (width, height) = window.pixel_size(scale);
        let max = self.max_canvas_dimension;
        if width > max as u64 || height > max as u64 {
            return Err(ApiError::WindowTooLarge { width, height, max });
        }

        Ok((provider.clone(), window, scale))
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            providers: Arc::clone(&self.providers),
            queue: self.queue.clone(),
            max_canvas_dimension: self.max_canvas_dimension,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters describing a map window.
///
/// Shared by `/map` and `/stitcher`. All fields are optional.
#[derive(Debug, Default, Deserialize)]
pub struct MapQueryParams {
    /// Provider name (defaults to the first provider by name)
    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub zoom: Option<i64>,

    #[serde(default)]
    pub xmin: Option<i64>,

    #[serde(default)]
    pub ymin: Option<i64>,

    #[serde(default)]
    pub xmax: Option<i64>,

    #[serde(default)]
    pub ymax: Option<i64>,

    /// Output cell size in pixels (defaults to the provider's tile size)
    #[serde(default)]
    pub scale: Option<u32>,
}

/// Query parameters for the queue endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct QueueQueryParams {
    /// Restrict the listing to this job id
    #[serde(default)]
    pub request: Option<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "unknown_provider", "store_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Public view of a provider.
#[derive(Debug, Serialize)]
pub struct ProviderResponse {
    pub name: String,
    pub min_zoom: u32,
    pub max_zoom: u32,
    pub scale: u32,
    pub attribution: String,
    pub sharded: bool,
}

impl From<&Provider> for ProviderResponse {
    fn from(provider: &Provider) -> Self {
        Self {
            name: provider.name.clone(),
            min_zoom: provider.min_zoom,
            max_zoom: provider.max_zoom,
            scale: provider.scale,
            attribution: provider.attribution.clone(),
            sharded: provider.is_sharded(),
        }
    }
}

/// Response from the providers endpoint.
#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    /// Name of the provider used when a request names none
    pub default: String,
    pub providers: Vec<ProviderResponse>,
}

/// One tile of a map view, positioned in output pixels.
#[derive(Debug, Serialize)]
pub struct MapTileResponse {
    pub url: String,
    pub left: i64,
    pub top: i64,
}

/// Response from the map endpoint.
#[derive(Debug, Serialize)]
pub struct MapResponse {
    pub provider: String,
    pub attribution: String,

    /// The normalized window
    pub window: TileWindow,

    pub scale: u32,

    /// Output width in pixels
    pub width: u64,

    /// Output height in pixels
    pub height: u64,

    /// Tiles in row-major order
    pub tiles: Vec<MapTileResponse>,

    pub navigation: Navigation,
}

/// Public view of a job.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub provider: String,
    pub window: TileWindow,
    pub scale: u32,
    pub width: u64,
    pub height: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<StitchSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Artifact URL, present once the job is done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl JobResponse {
    fn from_job(job: &Job, artifact_name: String) -> Self {
        let (width, height) = job.params.pixel_size();
        let artifact = match job.state {
            JobState::Done => Some(format!("{}/{}", ARTIFACTS_PATH, artifact_name)),
            JobState::New | JobState::Error => None,
        };

        Self {
            id: job.id.to_string(),
            state: job.state,
            created_at: job.created_at,
            provider: job.params.provider.name.clone(),
            window: job.params.window(),
            scale: job.params.scale,
            width,
            height,
            summary: job.summary,
            error: job.error.clone(),
            artifact,
        }
    }
}

/// Response from the queue endpoint.
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub jobs: Vec<JobResponse>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert ApiError to HTTP response.
///
/// 4xx errors are logged at DEBUG level, 5xx errors at ERROR level.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::UnknownProvider(_) => {
                (StatusCode::BAD_REQUEST, "unknown_provider", self.to_string())
            }
            ApiError::InvalidJobId(_) => {
                (StatusCode::BAD_REQUEST, "invalid_job_id", self.to_string())
            }
            ApiError::InvalidScale(_) => {
                (StatusCode::BAD_REQUEST, "invalid_scale", self.to_string())
            }
            ApiError::WindowTooLarge { .. } | ApiError::TooManyTiles { .. } => {
                (StatusCode::BAD_REQUEST, "window_too_large", self.to_string())
            }
            ApiError::Store(StoreError::InvalidId(id)) => (
                StatusCode::BAD_REQUEST,
                "invalid_job_id",
                format!("Invalid job id: {:?}", id),
            ),
            ApiError::Store(StoreError::Timeout(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "store_timeout",
                self.to_string(),
            ),
            ApiError::Store(store_err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                format!("Store error: {}", store_err),
            ),
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List configured providers.
///
/// # Endpoint
///
/// `GET /providers`
pub async fn providers_handler<S: JobStore>(
    State(state): State<AppState<S>>,
) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        default: state.providers.default_provider().name.clone(),
        providers: state.providers.iter().map(ProviderResponse::from).collect(),
    })
}

/// Describe a map view without creating a job.
///
/// # Endpoint
///
/// `GET /map?provider=&zoom=&xmin=&ymin=&xmax=&ymax=&scale=`
///
/// # Response
///
/// - `200 OK`: normalized window, output size, tile URLs with pixel
///   positions and the navigation windows reachable from this view
/// - `400 Bad Request`: unknown provider, zero scale, or a window too large
///   to stitch or to list
pub async fn map_handler<S: JobStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<MapQueryParams>,
) -> Result<Json<MapResponse>, ApiError> {
    let (provider, window, scale) = state.resolve(&query)?;
    let (width, height) = window.pixel_size(scale);

    let count = window.tile_count();
    if count > MAX_MAP_TILES {
        return Err(ApiError::TooManyTiles {
            count,
            max: MAX_MAP_TILES,
        });
    }

    let tiles = resolve_tiles(&window, &provider)
        .into_iter()
        .map(|address| {
            let (left, top) = address.pixel_offset(scale);
            MapTileResponse {
                url: address.url,
                left,
                top,
            }
        })
        .collect();

    Ok(Json(MapResponse {
        navigation: window.navigation(provider.min_zoom, provider.max_zoom),
        provider: provider.name,
        attribution: provider.attribution,
        window,
        scale,
        width,
        height,
        tiles,
    }))
}

/// Enqueue a stitch job.
///
/// # Endpoint
///
/// `POST /stitcher?provider=&zoom=&xmin=&ymin=&xmax=&ymax=&scale=`
///
/// # Response
///
/// - `202 Accepted`: the created job in state `new`
/// - `400 Bad Request`: unknown provider, zero scale or a window too large
///   to stitch
/// - `500 Internal Server Error`: the job could not be persisted
pub async fn stitcher_handler<S: JobStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<MapQueryParams>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    let (provider, window, scale) = state.resolve(&query)?;
    let job = state
        .queue
        .enqueue(StitchParams::new(window, scale, provider))
        .await?;

    let artifact_name = state.queue.artifact_name(&job.id);
    Ok((
        StatusCode::ACCEPTED,
        Json(JobResponse::from_job(&job, artifact_name)),
    ))
}

/// List job statuses.
///
/// # Endpoint
///
/// `GET /queue?request=<id>`
///
/// # Response
///
/// - `200 OK`: jobs in creation order; at most one when `request` is given
/// - `400 Bad Request`: malformed job id
pub async fn queue_handler<S: JobStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<QueueQueryParams>,
) -> Result<Json<QueueResponse>, ApiError> {
    let filter = match query.request.as_deref() {
        Some(raw) if !raw.is_empty() => Some(
            raw.parse::<JobId>()
                .map_err(|_| ApiError::InvalidJobId(raw.to_string()))?,
        ),
        _ => None,
    };

    let jobs = state.queue.list(filter.as_ref()).await?;
    let jobs = jobs
        .iter()
        .map(|job| JobResponse::from_job(job, state.queue.artifact_name(&job.id)))
        .collect();

    Ok(Json(QueueResponse { jobs }))
}

// =============================================================================
// Tests
// =============================================================================
