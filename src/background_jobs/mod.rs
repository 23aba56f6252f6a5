//! Batch reconciliation jobs.
//!
//! Each job loads its pending work from the repositories, processes items
//! with per-item error handling, and persists outcomes as it goes. Jobs run
//! once per invocation; scheduling and retry policy belong to the caller.

mod context;
mod job;
pub mod jobs;

pub use context::JobContext;
pub use job::{BackgroundJob, JobError};
