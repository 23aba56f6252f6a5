//! Recording-type classification job.
//!
//! Loads sources without a recorded recording type, classifies each through
//! the rule/model cascade, and persists every outcome, including `unknown`,
//! so re-runs do not re-attempt settled sources.

use crate::background_jobs::{BackgroundJob, JobContext, JobError};
use crate::recording_type::{ClassificationMethod, RecordingTypeClassifier};
use crate::semantic::ClassificationCache;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info};

pub struct RecordingTypeClassificationJob {
    classifier: RecordingTypeClassifier,
}

impl RecordingTypeClassificationJob {
    pub fn new(cache: Arc<ClassificationCache>) -> Self {
        Self {
            classifier: RecordingTypeClassifier::new(cache),
        }
    }
}

#[async_trait]
impl BackgroundJob for RecordingTypeClassificationJob {
    fn id(&self) -> &'static str {
        "recording_type_classification"
    }

    fn name(&self) -> &'static str {
        "Recording Type Classification"
    }

    fn description(&self) -> &'static str {
        "Classify the recording technique of unprocessed sources"
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let sources = ctx
            .source_store
            .unclassified_sources(ctx.settings.batch_size)
            .map_err(|e| {
                JobError::ExecutionFailed(format!("Failed to load unclassified sources: {}", e))
            })?;

        info!("Classifying {} unprocessed sources", sources.len());

        let mut by_rule = 0u32;
        let mut by_model = 0u32;
        let mut errors = 0u32;

        let mut results = stream::iter(sources)
            .map(|source| {
                let classifier = &self.classifier;
                let cancel = &ctx.cancellation_token;
                let allow_escalation = ctx.settings.allow_escalation;
                async move {
                    let meta = source.metadata();
                    let result = classifier.classify(&meta, allow_escalation, cancel).await;
                    (source, result)
                }
            })
            .buffer_unordered(ctx.settings.worker_pool_size.max(1));

        while let Some((source, result)) = results.next().await {
            if ctx.is_cancelled() {
                return Err(JobError::Cancelled);
            }

            match ctx
                .source_store
                .persist_source_classification(source.id, &result)
            {
                Ok(()) => match result.method {
                    ClassificationMethod::Rule => by_rule += 1,
                    ClassificationMethod::Llm => by_model += 1,
                },
                Err(e) => {
                    error!(
                        artist_id = source.artist_id,
                        identifier = %source.identifier,
                        error = %e,
                        "Failed to persist source classification"
                    );
                    errors += 1;
                }
            }
        }

        info!(
            by_rule, by_model, errors,
            "Recording type classification complete"
        );

        Ok(())
    }
}
