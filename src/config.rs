//! Configuration management for BigMap.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `BIGMAP_` prefix:
//!
//! - `BIGMAP_HOST` - Server bind address (default: 0.0.0.0)
//! - `BIGMAP_PORT` - Server port (default: 3000)
//! - `BIGMAP_QUEUE_DIR` - Directory for job records and images (default: ./queue)
//! - `BIGMAP_PROVIDERS` - Provider definition file (default: ./providers.json)
//! - `BIGMAP_RETENTION_SECS` - Job lifetime in seconds (default: 86400)
//! - `BIGMAP_MONITOR_INTERVAL_MS` - Time between queue sweeps (default: 1000)
//! - `BIGMAP_MAX_CONCURRENT_JOBS` - Jobs stitched in parallel (default: 2)
//! - `BIGMAP_MAX_CONCURRENT_FETCHES` - Tile fetches in parallel per job (default: 8)
//! - `BIGMAP_FETCH_TIMEOUT_SECS` - Per-tile fetch timeout (default: 30)
//! - `BIGMAP_WRITE_TIMEOUT_SECS` - Per-file write timeout (default: 60)
//! - `BIGMAP_MAX_CANVAS_DIMENSION` - Largest output side in pixels (default: 16384)
//! - `BIGMAP_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)
//!
//! # Example
//!
//! ```ignore
//! use bigmap::config::Config;
//! use clap::Parser;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Listening on {}", config.bind_address());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::queue::{
    MonitorConfig, WorkerConfig, DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_MAX_CONCURRENT_JOBS,
    DEFAULT_MONITOR_INTERVAL, DEFAULT_RETENTION, DEFAULT_WRITE_TIMEOUT,
};
use crate::tile::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_CANVAS_DIMENSION};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default queue directory.
pub const DEFAULT_QUEUE_DIR: &str = "queue";

/// Default provider definition file.
pub const DEFAULT_PROVIDERS_FILE: &str = "providers.json";

// =============================================================================
// CLI Arguments
// =============================================================================

/// BigMap - stitch web map tiles into single large images.
///
/// Accepts stitch requests over HTTP, queues them on disk and processes them
/// in the background. Finished images are served from the queue directory.
#[derive(Parser, Debug, Clone)]
#[command(name = "bigmap")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "BIGMAP_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "BIGMAP_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory holding job records and stitched images.
    #[arg(long, default_value = DEFAULT_QUEUE_DIR, env = "BIGMAP_QUEUE_DIR")]
    pub queue_dir: PathBuf,

    /// JSON file defining the tile providers.
    #[arg(long, default_value = DEFAULT_PROVIDERS_FILE, env = "BIGMAP_PROVIDERS")]
    pub providers: PathBuf,

    /// Seconds after which a job and its image are deleted.
    #[arg(long, default_value_t = DEFAULT_RETENTION.as_secs(), env = "BIGMAP_RETENTION_SECS")]
    pub retention_secs: u64,

    /// Timeout in seconds for writing a record or image.
    #[arg(long, default_value_t = DEFAULT_WRITE_TIMEOUT.as_secs(), env = "BIGMAP_WRITE_TIMEOUT_SECS")]
    pub write_timeout_secs: u64,

    // =========================================================================
    // Processing Configuration
    // =========================================================================
    /// Milliseconds between queue sweeps.
    #[arg(
        long,
        default_value_t = DEFAULT_MONITOR_INTERVAL.as_millis() as u64,
        env = "BIGMAP_MONITOR_INTERVAL_MS"
    )]
    pub monitor_interval_ms: u64,

    /// Maximum number of jobs stitched at the same time.
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_JOBS, env = "BIGMAP_MAX_CONCURRENT_JOBS")]
    pub max_concurrent_jobs: usize,

    /// Maximum number of tile fetches in flight per job.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CONCURRENT_FETCHES,
        env = "BIGMAP_MAX_CONCURRENT_FETCHES"
    )]
    pub max_concurrent_fetches: usize,

    /// Timeout in seconds for a single tile fetch.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT.as_secs(), env = "BIGMAP_FETCH_TIMEOUT_SECS")]
    pub fetch_timeout_secs: u64,

    /// Largest allowed output width or height in pixels.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CANVAS_DIMENSION,
        env = "BIGMAP_MAX_CANVAS_DIMENSION"
    )]
    pub max_canvas_dimension: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "BIGMAP_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.retention_secs == 0 {
            return Err("retention_secs must be greater than 0".to_string());
        }
        if self.monitor_interval_ms == 0 {
            return Err("monitor_interval_ms must be greater than 0".to_string());
        }
        if self.max_concurrent_jobs == 0 {
            return Err("max_concurrent_jobs must be greater than 0".to_string());
        }
        if self.max_concurrent_fetches == 0 {
            return Err("max_concurrent_fetches must be greater than 0".to_string());
        }
        if self.fetch_timeout_secs == 0 {
            return Err("fetch_timeout_secs must be greater than 0".to_string());
        }
        if self.write_timeout_secs == 0 {
            return Err("write_timeout_secs must be greater than 0".to_string());
        }
        if self.max_canvas_dimension == 0 {
            return Err("max_canvas_dimension must be greater than 0".to_string());
        }
        if self.queue_dir.as_os_str().is_empty() {
            return Err("Queue directory is required. Set --queue-dir or BIGMAP_QUEUE_DIR".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Settings for the stitch worker.
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::default()
            .with_max_concurrent_fetches(self.max_concurrent_fetches)
            .with_fetch_timeout(self.fetch_timeout())
            .with_max_canvas_dimension(self.max_canvas_dimension)
    }

    /// Settings for the queue monitor.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_millis(self.monitor_interval_ms),
            retention: Duration::from_secs(self.retention_secs),
            max_concurrent_jobs: self.max_concurrent_jobs,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
