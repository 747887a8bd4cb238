//! Stitch job queue.
//!
//! ```text
//!   HTTP handlers                      background
//! ┌────────────────┐               ┌────────────────┐
//! │  StitchQueue   │               │  QueueMonitor  │  every interval:
//! │  enqueue/list  │               │                │   1. expire old jobs
//! └───────┬────────┘               └───┬────────┬───┘   2. dispatch NEW jobs
//!         │                            │        │
//!         ▼                            ▼        ▼
//! ┌──────────────────────────────────────┐ ┌────────────────┐
//! │            JobStore                  │◀│  StitchWorker  │
//! │  <id>.json records, <id>.png images  │ │ fetch+compose  │
//! └──────────────────────────────────────┘ └────────────────┘
//! ```
//!
//! The store is the only shared state. Handlers and the monitor never talk to
//! each other directly.

mod job;
mod monitor;
mod service;
mod store;
mod worker;

pub use job::{Job, JobId, JobState, StitchParams, StitchSummary};
pub use monitor::{
    MonitorConfig, MonitorReport, QueueMonitor, DEFAULT_MAX_CONCURRENT_JOBS,
    DEFAULT_MONITOR_INTERVAL, DEFAULT_RETENTION,
};
pub use service::StitchQueue;
pub use store::{FileJobStore, JobStore, DEFAULT_WRITE_TIMEOUT};
pub use worker::{StitchWorker, WorkerConfig, DEFAULT_MAX_CONCURRENT_FETCHES};
