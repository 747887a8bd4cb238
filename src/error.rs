use thiserror::Error;

/// Errors raised while loading or validating provider configuration.
///
/// These are fatal at startup: the queue never starts without usable providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider file could not be read
    #[error("Cannot read provider file {path}: {message}")]
    Read { path: String, message: String },

    /// The provider file is not valid JSON or has the wrong shape
    #[error("Cannot parse provider file: {0}")]
    Parse(String),

    /// A provider definition failed validation
    #[error("Invalid provider '{name}': {reason}")]
    Invalid { name: String, reason: String },

    /// The same provider name appears more than once
    #[error("Duplicate provider name: {0}")]
    Duplicate(String),

    /// No providers were defined
    #[error("No providers defined")]
    Empty,
}

/// Errors that occur when fetching or decoding a single tile.
///
/// Tile errors never fail a job; the worker logs them and leaves a gap.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Network or connection error
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// Provider answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Provider did not answer in time
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    /// Response body is not a decodable image
    #[error("Cannot decode tile {url}: {message}")]
    Decode { url: String, message: String },
}

/// Errors from the job store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Filesystem error on a record or artifact
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// Record could not be serialized
    #[error("Cannot serialize job {id}: {message}")]
    Serialize { id: String, message: String },

    /// Record exists but cannot be parsed
    #[error("Corrupt job record {path}: {message}")]
    Corrupt { path: String, message: String },

    /// Job identifier contains characters outside the id alphabet
    #[error("Invalid job id: {0:?}")]
    InvalidId(String),

    /// A write did not complete within the configured timeout
    #[error("Timed out writing {0}")]
    Timeout(String),
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Errors that are fatal to a stitch job.
///
/// Any of these moves the job to the `ERROR` state.
#[derive(Debug, Clone, Error)]
pub enum StitchError {
    /// Requested canvas exceeds the configured maximum dimension
    #[error("Canvas {width}x{height} exceeds maximum dimension {max}")]
    CanvasTooLarge { width: u64, height: u64, max: u32 },

    /// Canvas could not be encoded
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// Artifact could not be persisted
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by the HTTP API.
///
/// Mapped to status codes and JSON bodies in the server's handlers.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Request names a provider that is not configured
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Request names a malformed job id
    #[error("Invalid job id: {0:?}")]
    InvalidJobId(String),

    /// Request asks for an unusable output cell size
    #[error("Invalid scale: {0} (must be greater than 0)")]
    InvalidScale(u32),

    /// Window would produce a canvas above the configured maximum
    #[error("Window of {width}x{height} pixels exceeds maximum dimension {max}")]
    WindowTooLarge { width: u64, height: u64, max: u32 },

    /// Window has more tiles than a map view lists
    #[error("Window of {count} tiles exceeds the map view limit of {max}")]
    TooManyTiles { count: u64, max: u64 },

    /// Job store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}
