//! API integration tests.
//!
//! Tests verify:
//! - Health and provider listing
//! - Map view normalization, tile list and navigation
//! - Enqueue/list round trip and artifact serving
//! - HTTP error codes for bad input

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use bigmap::queue::{JobId, MonitorConfig};
use bigmap::tile::TileWindow;

use super::test_utils::{is_valid_png, MockTileFetcher, TestContext};

async fn send(router: axum::Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(router: axum::Router, uri: &str) -> (StatusCode, Value) {
    send(router, Method::GET, uri).await
}

async fn post(router: axum::Router, uri: &str) -> (StatusCode, Value) {
    send(router, Method::POST, uri).await
}

// =============================================================================
// Health and Providers
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let ctx = TestContext::new().await;
    let (status, json) = get(ctx.router(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_providers_endpoint() {
    let ctx = TestContext::new().await;
    let (status, json) = get(ctx.router(), "/providers").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["default"], "mem");

    let providers = json["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0]["name"], "mem");
    assert_eq!(providers[1]["name"], "osm");
    assert_eq!(providers[1]["sharded"], true);
    assert_eq!(providers[1]["max_zoom"], 19);
    // URL templates stay server-side
    assert!(providers[1].get("url_template").is_none());
}

// =============================================================================
// Map View
// =============================================================================

#[tokio::test]
async fn test_map_defaults() {
    let ctx = TestContext::new().await;
    let (status, json) = get(ctx.router(), "/map?provider=osm").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["provider"], "osm");
    assert_eq!(json["window"]["zoom"], 3);
    assert_eq!(json["window"]["xmin"], 1);
    assert_eq!(json["window"]["xmax"], 3);
    assert_eq!(json["scale"], 256);
    assert_eq!(json["width"], 768);
    assert_eq!(json["height"], 768);

    let tiles = json["tiles"].as_array().unwrap();
    assert_eq!(tiles.len(), 9);
    assert_eq!(tiles[0]["left"], 0);
    assert_eq!(tiles[0]["top"], 0);
    assert_eq!(tiles[1]["left"], 256);
    assert_eq!(tiles[3]["top"], 256);

    // Sharded URLs use one of the configured hosts
    let url = tiles[0]["url"].as_str().unwrap();
    assert!(url.ends_with("tile.test/3/1/1.png"), "{}", url);
    assert!(["https://a.", "https://b.", "https://c."]
        .iter()
        .any(|prefix| url.starts_with(prefix)));
}

#[tokio::test]
async fn test_map_normalizes_out_of_range_input() {
    let ctx = TestContext::new().await;
    let (status, json) = get(
        ctx.router(),
        "/map?provider=osm&zoom=2&xmin=-4&ymin=2&xmax=99&ymax=1&scale=16",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["window"]["xmin"], 0);
    assert_eq!(json["window"]["xmax"], 3);
    assert_eq!(json["window"]["ymin"], 2);
    assert_eq!(json["window"]["ymax"], 2);
    assert_eq!(json["width"], 64);
    assert_eq!(json["height"], 16);
    assert_eq!(json["tiles"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_map_navigation_at_map_edge() {
    let ctx = TestContext::new().await;
    let (status, json) = get(
        ctx.router(),
        "/map?provider=osm&zoom=0&xmin=0&ymin=0&xmax=0&ymax=0",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let nav = &json["navigation"];
    assert!(nav["expand_left"].is_null());
    assert!(nav["shift_right"].is_null());
    assert!(nav["shrink_left"].is_null());
    assert!(nav["zoom_out_half"].is_null());
    assert!(nav["zoom_out_keep"].is_null());
    assert_eq!(nav["zoom_in_double"]["zoom"], 1);
    assert_eq!(nav["zoom_in_double"]["xmax"], 1);
}

#[tokio::test]
async fn test_map_navigation_interior() {
    let ctx = TestContext::new().await;
    let (_, json) = get(ctx.router(), "/map?provider=osm").await;

    let nav = &json["navigation"];
    let expand_left: TileWindow = serde_json::from_value(nav["expand_left"].clone()).unwrap();
    assert_eq!(
        expand_left,
        TileWindow {
            zoom: 3,
            xmin: 0,
            ymin: 1,
            xmax: 3,
            ymax: 3
        }
    );
    assert_eq!(nav["shift_right"]["xmin"], 2);
    assert_eq!(nav["shrink_top"]["ymin"], 2);
}

#[tokio::test]
async fn test_map_unknown_provider() {
    let ctx = TestContext::new().await;
    let (status, json) = get(ctx.router(), "/map?provider=nope").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "unknown_provider");
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_map_zero_scale() {
    let ctx = TestContext::new().await;
    let (status, json) = get(ctx.router(), "/map?scale=0").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_scale");
}

#[tokio::test]
async fn test_map_window_above_canvas_limit() {
    let ctx = TestContext::new().await;
    let (status, json) = get(
        ctx.router(),
        "/map?provider=osm&zoom=19&xmin=0&ymin=0&xmax=999999&ymax=999999",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "window_too_large");
}

#[tokio::test]
async fn test_map_too_many_tiles_to_list() {
    let ctx = TestContext::new().await;
    // 128x128 one-pixel cells fit the canvas but not the tile listing
    let (status, json) = get(
        ctx.router(),
        "/map?provider=osm&zoom=7&xmin=0&ymin=0&xmax=999&ymax=999&scale=1",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "window_too_large");
}

#[tokio::test]
async fn test_map_non_numeric_parameter() {
    let ctx = TestContext::new().await;
    let (status, _) = get(ctx.router(), "/map?zoom=three").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Stitcher and Queue
// =============================================================================

#[tokio::test]
async fn test_enqueue_then_list() {
    let ctx = TestContext::new().await;

    let (status, job) = post(
        ctx.router(),
        "/stitcher?provider=osm&zoom=4&xmin=2&ymin=3&xmax=4&ymax=5",
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(job["state"], "new");
    assert_eq!(job["provider"], "osm");
    assert_eq!(job["window"]["zoom"], 4);
    assert_eq!(job["width"], 768);
    assert!(job.get("artifact").is_none());

    let id = job["id"].as_str().unwrap().to_string();

    let (status, json) = get(ctx.router(), &format!("/queue?request={}", id)).await;
    assert_eq!(status, StatusCode::OK);
    let jobs = json["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], id.as_str());
    assert_eq!(jobs[0]["state"], "new");
    assert_eq!(jobs[0]["window"], job["window"]);
}

#[tokio::test]
async fn test_queue_lists_jobs_in_creation_order() {
    let ctx = TestContext::new().await;

    let mut ids = Vec::new();
    for zoom in [2, 3, 4] {
        let (_, job) = post(ctx.router(), &format!("/stitcher?zoom={}", zoom)).await;
        ids.push(job["id"].as_str().unwrap().to_string());
    }

    let (status, json) = get(ctx.router(), "/queue").await;
    assert_eq!(status, StatusCode::OK);

    let listed: Vec<_> = json["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn test_stitcher_requires_post() {
    let ctx = TestContext::new().await;
    let (status, _) = get(ctx.router(), "/stitcher").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_stitcher_unknown_provider_creates_nothing() {
    let ctx = TestContext::new().await;

    let (status, json) = post(ctx.router(), "/stitcher?provider=nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "unknown_provider");

    let (_, json) = get(ctx.router(), "/queue").await;
    assert!(json["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_stitcher_window_above_canvas_limit_creates_nothing() {
    let ctx = TestContext::new().await;

    let (status, json) = post(
        ctx.router(),
        "/stitcher?provider=osm&zoom=19&xmin=0&ymin=0&xmax=999999&ymax=999999",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "window_too_large");

    let (_, json) = get(ctx.router(), "/queue").await;
    assert!(json["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_queue_filter_on_corrupt_record() {
    let ctx = TestContext::new().await;
    let id: JobId = "0000-corrupt".parse().unwrap();
    std::fs::write(ctx.store.record_path(&id), b"{\"id\": ").unwrap();

    let (status, json) = get(ctx.router(), "/queue?request=0000-corrupt").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_queue_invalid_job_id() {
    let ctx = TestContext::new().await;
    let (status, json) = get(ctx.router(), "/queue?request=..%2Fetc%2Fpasswd").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_job_id");
}

#[tokio::test]
async fn test_queue_unknown_job_id() {
    let ctx = TestContext::new().await;
    let (status, json) = get(ctx.router(), "/queue?request=0000-unknown").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["jobs"].as_array().unwrap().is_empty());
}

// =============================================================================
// Artifacts
// =============================================================================

#[tokio::test]
async fn test_processed_job_artifact_is_served() {
    let ctx = TestContext::new().await;

    let (_, job) = post(ctx.router(), "/stitcher").await;
    let id = job["id"].as_str().unwrap().to_string();

    let provider = ctx.providers.get("mem").unwrap();
    let window: TileWindow = serde_json::from_value(job["window"].clone()).unwrap();
    let fetcher = Arc::new(MockTileFetcher::new().with_window(provider, &window));

    let report = ctx
        .monitor(Arc::clone(&fetcher), MonitorConfig::default())
        .run_once()
        .await
        .unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(fetcher.request_count(), 9);

    let (_, json) = get(ctx.router(), &format!("/queue?request={}", id)).await;
    let listed = &json["jobs"][0];
    assert_eq!(listed["state"], "done");
    assert_eq!(listed["summary"]["tiles_total"], 9);
    assert_eq!(listed["summary"]["tiles_fetched"], 9);

    let artifact = listed["artifact"].as_str().unwrap().to_string();
    assert_eq!(artifact, format!("/artifacts/{}.png", id));

    let request = Request::builder()
        .uri(&artifact)
        .body(Body::empty())
        .unwrap();
    let response = ctx.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(is_valid_png(&body));
    let image = image::load_from_memory(&body).unwrap();
    assert_eq!((image.width(), image.height()), (12, 12));
}

#[tokio::test]
async fn test_job_records_are_not_served_as_artifacts() {
    let ctx = TestContext::new().await;

    let (_, job) = post(ctx.router(), "/stitcher").await;
    let id = job["id"].as_str().unwrap().to_string();
    assert!(ctx.store.record_path(&id.parse().unwrap()).exists());

    let temp = ctx.store.dir().join(format!("{}.png.tmp", id));
    std::fs::write(&temp, b"partial").unwrap();

    for uri in [
        format!("/artifacts/{}.json", id),
        format!("/artifacts/{}.png.tmp", id),
    ] {
        let request = Request::builder().uri(&uri).body(Body::empty()).unwrap();
        let response = ctx.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_missing_artifact_is_not_found() {
    let ctx = TestContext::new().await;
    let request = Request::builder()
        .uri("/artifacts/0000-missing.png")
        .body(Body::empty())
        .unwrap();

    let response = ctx.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
