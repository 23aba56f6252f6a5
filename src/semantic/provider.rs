//! Semantic model provider trait definition.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Options for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    /// Temperature for sampling; kept low so classifications are repeatable.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 512,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Errors that can occur when calling the semantic model endpoint.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timeout")]
    Timeout,
}

/// Narrow interface to an external semantic-classification endpoint.
///
/// The model is treated as a black box that returns text the caller parses
/// as JSON; all prompt text and schema assumptions live with the classifier
/// that owns them.
#[async_trait]
pub trait SemanticModel: Send + Sync {
    /// The model identifier in use (for logging).
    fn model(&self) -> &str;

    /// Complete one system-prompt/user-content pair into raw message text.
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
        options: &CompletionOptions,
    ) -> Result<String, ModelError>;
}
