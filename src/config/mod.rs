mod file_config;

pub use file_config::{FileConfig, ModelConfig, ReconcileConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// Mirrors the CLI surface that TOML config can override.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub archive_db: Option<PathBuf>,
    pub cache_db: Option<PathBuf>,
    pub model_base_url: String,
    pub model_name: String,
    pub model_api_key: Option<String>,
    pub model_timeout_secs: u64,
    pub allow_escalation: bool,
    pub batch_size: usize,
    pub worker_pool_size: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            archive_db: None,
            cache_db: None,
            model_base_url: "http://localhost:11434/v1".to_string(),
            model_name: "llama3.1:8b".to_string(),
            model_api_key: None,
            model_timeout_secs: 30,
            allow_escalation: false,
            batch_size: 500,
            worker_pool_size: 4,
        }
    }
}

/// Semantic model endpoint settings.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

/// Cross-cutting batch settings threaded into every job.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Whether low-confidence results may escalate to the semantic model.
    pub allow_escalation: bool,
    /// Maximum items loaded per batch per job.
    pub batch_size: usize,
    /// Concurrent model escalations across a batch.
    pub worker_pool_size: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub archive_db: PathBuf,
    pub cache_db: PathBuf,
    pub model: ModelSettings,
    pub reconcile: ReconcileSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let archive_db = file
            .archive_db
            .map(PathBuf::from)
            .or_else(|| cli.archive_db.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("archive_db must be specified on the CLI or in the config file")
            })?;

        // The cache lives next to the archive unless placed explicitly.
        let cache_db = file
            .cache_db
            .map(PathBuf::from)
            .or_else(|| cli.cache_db.clone())
            .unwrap_or_else(|| {
                archive_db
                    .parent()
                    .map(|dir| dir.join("semantic_cache.db"))
                    .unwrap_or_else(|| PathBuf::from("semantic_cache.db"))
            });

        let model_file = file.model.unwrap_or_default();
        let model = ModelSettings {
            base_url: model_file.base_url.unwrap_or_else(|| cli.model_base_url.clone()),
            model: model_file.model.unwrap_or_else(|| cli.model_name.clone()),
            api_key: model_file.api_key.or_else(|| cli.model_api_key.clone()),
            timeout_secs: model_file.timeout_secs.unwrap_or(cli.model_timeout_secs),
        };

        let reconcile_file = file.reconcile.unwrap_or_default();
        let reconcile = ReconcileSettings {
            allow_escalation: reconcile_file
                .allow_escalation
                .unwrap_or(cli.allow_escalation),
            batch_size: reconcile_file.batch_size.unwrap_or(cli.batch_size),
            worker_pool_size: reconcile_file
                .worker_pool_size
                .unwrap_or(cli.worker_pool_size),
        };

        if reconcile.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if reconcile.worker_pool_size == 0 {
            bail!("worker_pool_size must be at least 1");
        }
        if model.timeout_secs == 0 {
            bail!("model timeout_secs must be at least 1");
        }

        Ok(Self {
            archive_db,
            cache_db,
            model,
            reconcile,
        })
    }
}
