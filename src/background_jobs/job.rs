use super::context::JobContext;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during job execution.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Job was cancelled")]
    Cancelled,
}

/// Trait for batch reconciliation jobs.
///
/// Implementations should check `ctx.is_cancelled()` between items and
/// return `JobError::Cancelled` promptly; work persisted before the check
/// stays persisted.
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    /// Unique identifier for this job.
    fn id(&self) -> &'static str;

    /// Human-readable name for this job.
    fn name(&self) -> &'static str;

    /// Description of what this job does.
    fn description(&self) -> &'static str;

    /// Execute the job to completion against the context's repositories.
    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
