//! Test utilities for integration tests.
//!
//! Provides an in-memory tile fetcher, a local HTTP tile server and a test
//! context wiring a temporary job store to the router and the monitor.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use tempfile::TempDir;

use bigmap::error::FetchError;
use bigmap::provider::{Provider, ProviderRegistry};
use bigmap::queue::{
    FileJobStore, MonitorConfig, QueueMonitor, StitchQueue, StitchWorker, WorkerConfig,
};
use bigmap::server::{create_router, RouterConfig};
use bigmap::tile::{tile_url, TileFetcher, TileWindow};

/// Tile size used by the in-memory provider.
pub const TILE_SIZE: u32 = 4;

/// Column the local tile server answers with 404.
pub const MISSING_COLUMN: u32 = 5;

/// Providers for API tests. `mem` sorts first and is the default.
pub const PROVIDERS_JSON: &str = r#"[
    {"name": "osm", "min_zoom": 0, "max_zoom": 19, "scale": 256,
     "url": "https://[abc].tile.test/{z}/{x}/{y}.png", "attribution": "Test contributors"},
    {"name": "mem", "min_zoom": 0, "max_zoom": 18, "scale": 4,
     "url": "mem://tiles/{z}/{x}/{y}.png", "attribution": "Memory"}
]"#;

// =============================================================================
// Tile Images
// =============================================================================

/// Deterministic colour of tile `(x, y)`.
pub fn tile_color(x: u32, y: u32) -> [u8; 4] {
    [(x * 10 % 256) as u8, (y * 10 % 256) as u8, 100, 255]
}

/// Encode a solid tile as PNG.
pub fn png_tile(size: u32, color: [u8; 4]) -> Bytes {
    let img = RgbaImage::from_pixel(size, size, Rgba(color));
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), size, size, ExtendedColorType::Rgba8)
        .unwrap();
    Bytes::from(buf)
}

/// Check for the PNG signature.
pub fn is_valid_png(data: &[u8]) -> bool {
    data.len() > 8 && &data[..8] == b"\x89PNG\r\n\x1a\n"
}

// =============================================================================
// Mock Tile Fetcher
// =============================================================================

/// In-memory tile source that counts requests.
#[derive(Default)]
pub struct MockTileFetcher {
    tiles: HashMap<String, Bytes>,
    request_count: AtomicUsize,
}

impl MockTileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve every tile of `window` for `provider`.
    pub fn with_window(mut self, provider: &Provider, window: &TileWindow) -> Self {
        for y in window.ymin..=window.ymax {
            for x in window.xmin..=window.xmax {
                self.tiles.insert(
                    tile_url(provider, x, y, window.zoom),
                    png_tile(provider.scale, tile_color(x, y)),
                );
            }
        }
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TileFetcher for MockTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.tiles.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

// =============================================================================
// Local Tile Server
// =============================================================================

async fn serve_tile(Path((_z, x, file)): Path<(u32, u32, String)>) -> Response {
    let y = match file.strip_suffix(".png").and_then(|y| y.parse::<u32>().ok()) {
        Some(y) => y,
        None => return StatusCode::BAD_REQUEST.into_response(),
    };

    if x == MISSING_COLUMN {
        return StatusCode::NOT_FOUND.into_response();
    }

    (
        [(header::CONTENT_TYPE, "image/png")],
        png_tile(TILE_SIZE, tile_color(x, y)),
    )
        .into_response()
}

/// Start a tile server on an ephemeral local port.
///
/// Serves `/tiles/{z}/{x}/{y}.png`; column [`MISSING_COLUMN`] is always 404.
pub async fn spawn_tile_server() -> SocketAddr {
    let router = Router::new().route("/tiles/{z}/{x}/{file}", get(serve_tile));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}

/// Provider pointing at a local tile server.
pub fn local_provider(addr: SocketAddr) -> Provider {
    let json = format!(
        r#"[{{"name": "local", "min_zoom": 0, "max_zoom": 10, "scale": {},
             "url": "http://{}/tiles/{{z}}/{{x}}/{{y}}.png"}}]"#,
        TILE_SIZE, addr
    );
    ProviderRegistry::from_json(&json)
        .unwrap()
        .default_provider()
        .clone()
}

// =============================================================================
// Test Context
// =============================================================================

/// Temporary store plus the components built on top of it.
pub struct TestContext {
    pub dir: TempDir,
    pub store: Arc<FileJobStore>,
    pub providers: Arc<ProviderRegistry>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_providers(PROVIDERS_JSON).await
    }

    pub async fn with_providers(json: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileJobStore::open(dir.path().join("queue")).await.unwrap());
        let providers = Arc::new(ProviderRegistry::from_json(json).unwrap());
        Self {
            dir,
            store,
            providers,
        }
    }

    pub fn queue(&self) -> StitchQueue<FileJobStore> {
        StitchQueue::new(Arc::clone(&self.store))
    }

    /// Router serving artifacts from the store directory, without tracing.
    pub fn router(&self) -> Router {
        let config = RouterConfig::new()
            .with_artifacts_dir(self.store.dir())
            .with_tracing(false);
        create_router(Arc::clone(&self.providers), self.queue(), config)
    }

    pub fn monitor<F: TileFetcher + 'static>(
        &self,
        fetcher: Arc<F>,
        config: MonitorConfig,
    ) -> QueueMonitor<FileJobStore, F> {
        let worker = StitchWorker::new(Arc::clone(&self.store), fetcher, WorkerConfig::default());
        QueueMonitor::new(Arc::clone(&self.store), worker, config)
    }
}
