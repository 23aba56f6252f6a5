//! Cache-wrapped classification client.
//!
//! Classification results are stable facts about stable inputs, so they are
//! cached under a hash of the prompt payload with a long TTL. Only a cache
//! miss costs a model call.

use super::provider::{CompletionOptions, ModelError, SemanticModel};
use anyhow::Result;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Classifications are stable facts, not time-sensitive data.
pub const CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Keyed cache store with TTL support. Any TTL-capable key-value store
/// qualifies; the engine ships a SQLite-backed implementation.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

/// Compute the cache key for a classification request:
/// namespace plus the first 32 hex chars of SHA-256 over the user content.
pub fn cache_key(namespace: &str, user_content: &str) -> String {
    let digest = Sha256::digest(user_content.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}:{}", namespace, &hex[..32])
}

/// Cache-wrapped client around the external semantic-classification call.
pub struct ClassificationCache {
    model: Arc<dyn SemanticModel>,
    store: Arc<dyn CacheStore>,
    options: CompletionOptions,
}

impl ClassificationCache {
    pub fn new(model: Arc<dyn SemanticModel>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            model,
            store,
            options: CompletionOptions::default(),
        }
    }

    pub fn with_options(
        model: Arc<dyn SemanticModel>,
        store: Arc<dyn CacheStore>,
        options: CompletionOptions,
    ) -> Self {
        Self {
            model,
            store,
            options,
        }
    }

    /// Classify `user_content` under `namespace`, returning the parsed result.
    ///
    /// A cached result is returned without a model call; a corrupt cache
    /// entry is discarded and treated as a miss. Returns `None` on transport
    /// failure, empty content, parse error, or cancellation — callers must
    /// treat `None` as "could not classify", never as an outcome.
    pub async fn classify<T: DeserializeOwned>(
        &self,
        system_prompt: &str,
        user_content: &str,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Option<T> {
        let key = cache_key(namespace, user_content);

        match self.store.get(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(parsed) => {
                    debug!(namespace, "classification cache hit");
                    return Some(parsed);
                }
                Err(e) => {
                    warn!(namespace, key = %key, error = %e, "Discarding corrupt cache entry");
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(namespace, key = %key, error = %e, "Cache read failed");
            }
        }

        let call = self.model.complete(system_prompt, user_content, &self.options);
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(namespace, "classification cancelled");
                return None;
            }
            result = call => match result {
                Ok(content) => content,
                Err(e) => {
                    log_model_error(namespace, &e);
                    return None;
                }
            },
        };

        let body = strip_code_fences(&raw);
        if body.is_empty() {
            warn!(namespace, "semantic model returned empty content");
            return None;
        }

        match serde_json::from_str::<T>(body) {
            Ok(parsed) => {
                if let Err(e) = self.store.set(&key, body, CACHE_TTL) {
                    warn!(namespace, key = %key, error = %e, "Cache write failed");
                }
                Some(parsed)
            }
            Err(e) => {
                warn!(namespace, error = %e, "semantic model returned unparseable content");
                None
            }
        }
    }
}

fn log_model_error(namespace: &str, error: &ModelError) {
    match error {
        ModelError::Timeout => warn!(namespace, "semantic model call timed out"),
        ModelError::RateLimited => warn!(namespace, "semantic model rate limited"),
        other => warn!(namespace, error = %other, "semantic model call failed"),
    }
}

/// Some endpoints wrap JSON output in markdown fences despite JSON mode.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}
