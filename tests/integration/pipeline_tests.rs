//! End-to-end pipeline tests.
//!
//! Tests verify:
//! - Stitching real HTTP tiles from a local tile server
//! - Failed tiles leave transparent gaps without failing the job
//! - Expiry removes records and artifacts
//! - The monitor loop picks up jobs created while it runs

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use bigmap::error::FetchError;
use bigmap::queue::{JobState, MonitorConfig, StitchParams};
use bigmap::tile::{normalize, HttpTileFetcher, TileFetcher, WindowRequest};

use super::test_utils::{
    local_provider, spawn_tile_server, tile_color, MockTileFetcher, TestContext, MISSING_COLUMN,
    TILE_SIZE,
};

// =============================================================================
// HTTP Fetching
// =============================================================================

#[tokio::test]
async fn test_http_fetcher_against_local_server() {
    let addr = spawn_tile_server().await;
    let fetcher = HttpTileFetcher::new(Duration::from_secs(5)).unwrap();

    let data = fetcher
        .fetch(&format!("http://{}/tiles/3/1/2.png", addr))
        .await
        .unwrap();
    let image = bigmap::tile::decode_tile(&data, "local").unwrap();
    assert_eq!(image.dimensions(), (TILE_SIZE, TILE_SIZE));
    assert_eq!(image.get_pixel(0, 0).0, tile_color(1, 2));

    let missing = fetcher
        .fetch(&format!("http://{}/tiles/3/{}/2.png", addr, MISSING_COLUMN))
        .await;
    match missing {
        Err(FetchError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("Expected Status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stitch_from_local_tile_server() {
    let addr = spawn_tile_server().await;
    let provider = local_provider(addr);
    let ctx = TestContext::new().await;

    // Columns 4..=6 at zoom 3; column 5 is missing on the server
    let window = normalize(WindowRequest::new(3, 4, 2, 6, 3), 0, 10);
    let job = ctx
        .queue()
        .enqueue(StitchParams::new(window, TILE_SIZE, provider))
        .await
        .unwrap();

    let fetcher = Arc::new(HttpTileFetcher::new(Duration::from_secs(5)).unwrap());
    let report = ctx
        .monitor(fetcher, MonitorConfig::default())
        .run_once()
        .await
        .unwrap();
    assert_eq!(report.processed, 1);

    let done = ctx.queue().get(&job.id).await.unwrap().unwrap();
    assert_eq!(done.state, JobState::Done);
    let summary = done.summary.unwrap();
    assert_eq!(summary.tiles_total, 6);
    assert_eq!(summary.tiles_fetched, 4);

    let data = std::fs::read(ctx.store.artifact_path(&job.id)).unwrap();
    let image = image::load_from_memory(&data).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (3 * TILE_SIZE, 2 * TILE_SIZE));

    // Tile (4, 3) sits in column 0, row 1
    assert_eq!(image.get_pixel(0, TILE_SIZE).0, tile_color(4, 3));
    // Missing column 5 is transparent
    assert_eq!(image.get_pixel(TILE_SIZE, 0).0, [0, 0, 0, 0]);
    assert_eq!(image.get_pixel(2 * TILE_SIZE, 0).0, tile_color(6, 2));
}

// =============================================================================
// Expiry
// =============================================================================

#[tokio::test]
async fn test_expired_artifact_no_longer_served() {
    let ctx = TestContext::new().await;
    let provider = ctx.providers.default_provider().clone();
    let window = normalize(WindowRequest::new(1, 0, 0, 1, 1), 0, 18);

    let job = ctx
        .queue()
        .enqueue(StitchParams::new(window, provider.scale, provider.clone()))
        .await
        .unwrap();

    let fetcher = Arc::new(MockTileFetcher::new().with_window(&provider, &window));
    let config = MonitorConfig {
        retention: Duration::from_secs(600),
        ..Default::default()
    };
    let monitor = ctx.monitor(fetcher, config);
    monitor.run_once().await.unwrap();

    let uri = format!("/artifacts/{}.png", job.id);
    let request = Request::builder().uri(&uri).body(Body::empty()).unwrap();
    let response = ctx.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = monitor
        .run_once_at(Utc::now() + chrono::Duration::seconds(601))
        .await
        .unwrap();
    assert_eq!(report.expired, 1);

    let request = Request::builder().uri(&uri).body(Body::empty()).unwrap();
    let response = ctx.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(ctx.queue().get(&job.id).await.unwrap().is_none());
}

// =============================================================================
// Monitor Loop
// =============================================================================

#[tokio::test]
async fn test_monitor_loop_processes_jobs_created_while_running() {
    let ctx = TestContext::new().await;
    let provider = ctx.providers.default_provider().clone();
    let window = normalize(WindowRequest::new(2, 0, 0, 3, 3), 0, 18);
    let fetcher = Arc::new(MockTileFetcher::new().with_window(&provider, &window));

    let config = MonitorConfig {
        interval: Duration::from_millis(20),
        max_concurrent_jobs: 2,
        ..Default::default()
    };
    let shutdown = CancellationToken::new();
    let handle = ctx.monitor(Arc::clone(&fetcher), config).spawn(shutdown.clone());

    let mut ids = Vec::new();
    for _ in 0..5 {
        let job = ctx
            .queue()
            .enqueue(StitchParams::new(window, provider.scale, provider.clone()))
            .await
            .unwrap();
        ids.push(job.id);
        tokio::time::sleep(Duration::from_millis(15)).await;
    }

    let mut all_done = false;
    for _ in 0..300 {
        let jobs = ctx.queue().list(None).await.unwrap();
        if jobs.len() == 5 && jobs.iter().all(|j| j.state == JobState::Done) {
            all_done = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(all_done);
    assert_eq!(fetcher.request_count(), 5 * 16);

    for id in &ids {
        assert!(ctx.store.artifact_path(id).exists());
    }

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_identical_jobs_produce_identical_artifacts() {
    let ctx = TestContext::new().await;
    let provider = ctx.providers.default_provider().clone();
    let window = normalize(WindowRequest::new(2, 1, 1, 2, 2), 0, 18);
    let fetcher = Arc::new(MockTileFetcher::new().with_window(&provider, &window));

    let first = ctx
        .queue()
        .enqueue(StitchParams::new(window, provider.scale, provider.clone()))
        .await
        .unwrap();
    let second = ctx
        .queue()
        .enqueue(StitchParams::new(window, provider.scale, provider.clone()))
        .await
        .unwrap();

    ctx.monitor(fetcher, MonitorConfig::default())
        .run_once()
        .await
        .unwrap();

    let a = std::fs::read(ctx.store.artifact_path(&first.id)).unwrap();
    let b = std::fs::read(ctx.store.artifact_path(&second.id)).unwrap();
    assert_eq!(a, b);
}
