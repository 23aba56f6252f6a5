//! Venue canonicalization job.

use crate::background_jobs::{BackgroundJob, JobContext, JobError};
use crate::venue_match::VenueCanonicalizer;
use async_trait::async_trait;

pub struct VenueCanonicalizationJob;

#[async_trait]
impl BackgroundJob for VenueCanonicalizationJob {
    fn id(&self) -> &'static str {
        "venue_canonicalization"
    }

    fn name(&self) -> &'static str {
        "Venue Canonicalization"
    }

    fn description(&self) -> &'static str {
        "Link artist-scoped venues to canonical physical venues"
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        // Matching is deterministic and index-order dependent, so the batch
        // runs single-writer on one task.
        VenueCanonicalizer::canonicalize_batch(
            ctx.venue_store.as_ref(),
            ctx.settings.batch_size,
            &ctx.cancellation_token,
        )
        .map_err(|e| JobError::ExecutionFailed(format!("Venue canonicalization failed: {}", e)))?;

        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        Ok(())
    }
}
