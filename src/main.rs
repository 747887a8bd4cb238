//! BigMap - stitch web map tiles into single large images.
//!
//! This binary loads the providers, starts the queue monitor and serves the
//! HTTP API until interrupted.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bigmap::{
    config::Config,
    provider::ProviderRegistry,
    queue::{FileJobStore, QueueMonitor, StitchQueue, StitchWorker},
    server::{create_router, RouterConfig},
    tile::HttpTileFetcher,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let providers = match ProviderRegistry::load(&config.providers) {
        Ok(providers) => Arc::new(providers),
        Err(e) => {
            error!("Provider configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let store = match FileJobStore::open(&config.queue_dir).await {
        Ok(store) => Arc::new(store.with_write_timeout(config.write_timeout())),
        Err(e) => {
            error!("Failed to open queue directory: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let fetcher = match HttpTileFetcher::new(config.fetch_timeout()) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            error!("Failed to create tile fetcher: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Providers: {} ({})", providers.len(), config.providers.display());
    for provider in providers.iter() {
        info!(
            "    {} (zoom {}-{}, {}px)",
            provider.name, provider.min_zoom, provider.max_zoom, provider.scale
        );
    }
    info!("  Queue: {}", store.dir().display());
    info!(
        "  Retention: {}s, sweep every {}ms",
        config.retention_secs, config.monitor_interval_ms
    );
    info!(
        "  Concurrency: {} jobs, {} fetches/job",
        config.max_concurrent_jobs, config.max_concurrent_fetches
    );

    // Background processing
    let shutdown = CancellationToken::new();
    let worker = StitchWorker::new(Arc::clone(&store), fetcher, config.worker_config());
    let monitor = QueueMonitor::new(Arc::clone(&store), worker, config.monitor_config());
    let monitor_handle = monitor.spawn(shutdown.clone());

    // HTTP API
    let router_config = build_router_config(&config, store.dir());
    let router = create_router(providers, StitchQueue::new(Arc::clone(&store)), router_config);

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            shutdown.cancel();
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);

    let server_shutdown = shutdown.clone();
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
                _ = server_shutdown.cancelled() => {}
            }
        })
        .await;

    shutdown.cancel();
    if let Err(e) = monitor_handle.await {
        error!("Queue monitor task failed: {}", e);
    }

    if let Err(e) = served {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "bigmap=debug,tower_http=debug"
    } else {
        "bigmap=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config, artifacts_dir: &std::path::Path) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_artifacts_dir(artifacts_dir);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
        .with_tracing(!config.no_tracing)
        .with_max_canvas_dimension(config.max_canvas_dimension)
}
