//! Job records.
//!
//! A [`Job`] is one durable stitch request plus its lifecycle state. Only
//! three states are ever persisted:
//!
//! ```text
//!            stitch ok            expiry
//!   NEW ─────────────────▶ DONE ──────────▶ (removed)
//!    │                                ▲
//!    │  canvas/encode/write failed    │ expiry
//!    └────────────────────▶ ERROR ────┘
//! ```
//!
//! Work in progress is not persisted: a job stays `NEW` until its worker
//! writes the final state.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::provider::Provider;
use crate::tile::TileWindow;

/// Longest accepted job id.
const MAX_JOB_ID_LEN: usize = 64;

/// Process-wide sequence so ids created in the same millisecond stay ordered.
static JOB_SEQUENCE: AtomicU32 = AtomicU32::new(0);

// =============================================================================
// Job Id
// =============================================================================

/// Opaque job identifier.
///
/// Generated ids look like `0001760870400123-00002a-5f0c9e1b7d24`: a
/// zero-padded millisecond timestamp, a per-process sequence number and 48
/// random bits. Lexicographic order therefore follows creation order.
///
/// Ids only contain `[0-9a-z-]`, so they are always safe file names. Parsing
/// an id from untrusted input enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh, time-ordered id.
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    fn generate_at(now: DateTime<Utc>) -> Self {
        let millis = now.timestamp_millis().max(0);
        let sequence = JOB_SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;
        let random = Uuid::new_v4().simple().to_string();
        JobId(format!("{:016}-{:06x}-{}", millis, sequence, &random[..12]))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s.len() <= MAX_JOB_ID_LEN
            && s
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || c == '-');

        if valid {
            Ok(JobId(s.to_string()))
        } else {
            Err(StoreError::InvalidId(s.to_string()))
        }
    }
}

impl TryFrom<String> for JobId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

// =============================================================================
// Parameters and State
// =============================================================================

/// Immutable snapshot of a stitch request.
///
/// The provider is copied in full so later configuration changes never
/// affect a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StitchParams {
    pub zoom: u32,
    pub xmin: u32,
    pub ymin: u32,
    pub xmax: u32,
    pub ymax: u32,

    /// Output cell size in pixels per tile
    pub scale: u32,

    pub provider: Provider,
}

impl StitchParams {
    /// Build parameters from a normalized window.
    pub fn new(window: TileWindow, scale: u32, provider: Provider) -> Self {
        Self {
            zoom: window.zoom,
            xmin: window.xmin,
            ymin: window.ymin,
            xmax: window.xmax,
            ymax: window.ymax,
            scale,
            provider,
        }
    }

    /// The tile window these parameters cover.
    pub fn window(&self) -> TileWindow {
        TileWindow {
            zoom: self.zoom,
            xmin: self.xmin,
            ymin: self.ymin,
            xmax: self.xmax,
            ymax: self.ymax,
        }
    }

    /// Output image size in pixels.
    pub fn pixel_size(&self) -> (u64, u64) {
        self.window().pixel_size(self.scale)
    }
}

/// Persisted job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for, or being processed by, a worker
    New,
    /// Artifact written
    Done,
    /// Canvas could not be created, encoded or written
    Error,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::New => "new",
            JobState::Done => "done",
            JobState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Tile counts recorded with a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StitchSummary {
    pub tiles_total: u64,
    pub tiles_fetched: u64,
}

impl StitchSummary {
    /// Number of tiles that were skipped.
    pub fn tiles_missing(&self) -> u64 {
        self.tiles_total.saturating_sub(self.tiles_fetched)
    }
}

// =============================================================================
// Job
// =============================================================================

/// A persisted stitch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub params: StitchParams,
    pub state: JobState,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<StitchSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a fresh `NEW` job.
    pub fn new(params: StitchParams) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::generate_at(now),
            params,
            state: JobState::New,
            created_at: now,
            summary: None,
            error: None,
        }
    }

    /// Whether the job is older than `retention` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        // A creation time in the future (clock skew) yields a negative age.
        match now.signed_duration_since(self.created_at).to_std() {
            Ok(age) => age > retention,
            Err(_) => false,
        }
    }

    /// Mark the job done.
    pub fn complete(&mut self, summary: StitchSummary) {
        self.state = JobState::Done;
        self.summary = Some(summary);
        self.error = None;
    }

    /// Mark the job failed.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = JobState::Error;
        self.error = Some(message.into());
    }
}

// =============================================================================
// Tests
// =============================================================================
