use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tapedeck_reconciler::archive_store::{SqliteArchiveStore, SqliteCacheStore};
use tapedeck_reconciler::background_jobs::jobs::{
    RecordingTypeClassificationJob, TrackSongMatchingJob, VenueCanonicalizationJob,
};
use tapedeck_reconciler::background_jobs::{BackgroundJob, JobContext, JobError};
use tapedeck_reconciler::config::{AppConfig, CliConfig, FileConfig};
use tapedeck_reconciler::semantic::{ClassificationCache, CompletionOptions, OpenAiModel};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum JobSelection {
    /// Classify recording types of unprocessed sources.
    Sources,
    /// Match unprocessed track titles to canonical songs.
    Songs,
    /// Canonicalize unlinked artist venues.
    Venues,
    /// Run all reconciliation jobs in order.
    All,
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite archive database file.
    #[clap(value_parser = parse_path)]
    pub archive_db: PathBuf,

    /// Path to an optional TOML config file; its values override CLI args.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the semantic classification cache database.
    #[clap(long, value_parser = parse_path)]
    pub cache_db: Option<PathBuf>,

    /// Which reconciliation job(s) to run.
    #[clap(long, value_enum, default_value = "all")]
    pub job: JobSelection,

    /// Allow low-confidence results to escalate to the semantic model.
    #[clap(long)]
    pub allow_escalation: bool,

    /// Maximum items loaded per batch per job.
    #[clap(long, default_value_t = 500)]
    pub batch_size: usize,

    /// Concurrent model escalations across a batch.
    #[clap(long, default_value_t = 4)]
    pub workers: usize,

    /// Base URL of the OpenAI-compatible model endpoint.
    #[clap(long, default_value = "http://localhost:11434/v1")]
    pub model_base_url: String,

    /// Model to use for escalated classifications.
    #[clap(long, default_value = "llama3.1:8b")]
    pub model_name: String,

    /// API key for the model endpoint (falls back to MODEL_API_KEY).
    #[clap(long)]
    pub model_api_key: Option<String>,

    /// Timeout in seconds for model requests.
    #[clap(long, default_value_t = 30)]
    pub model_timeout_sec: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    info!("tapedeck-reconciler starting (git {})", env!("GIT_HASH"));

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };

    let cli_config = CliConfig {
        archive_db: Some(cli_args.archive_db.clone()),
        cache_db: cli_args.cache_db.clone(),
        model_base_url: cli_args.model_base_url.clone(),
        model_name: cli_args.model_name.clone(),
        model_api_key: cli_args
            .model_api_key
            .clone()
            .or_else(|| std::env::var("MODEL_API_KEY").ok()),
        model_timeout_secs: cli_args.model_timeout_sec,
        allow_escalation: cli_args.allow_escalation,
        batch_size: cli_args.batch_size,
        worker_pool_size: cli_args.workers,
    };

    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening archive database at {:?}...", config.archive_db);
    let archive_store = Arc::new(SqliteArchiveStore::new(&config.archive_db)?);

    let cache_store = Arc::new(SqliteCacheStore::new(&config.cache_db)?);
    let model = Arc::new(OpenAiModel::new(
        config.model.base_url.clone(),
        config.model.model.clone(),
        config.model.api_key.clone(),
    ));
    let classification_cache = Arc::new(ClassificationCache::with_options(
        model,
        cache_store,
        CompletionOptions {
            timeout: Duration::from_secs(config.model.timeout_secs),
            ..Default::default()
        },
    ));

    if config.reconcile.allow_escalation {
        info!(
            model = %config.model.model,
            endpoint = %config.model.base_url,
            "Model escalation enabled"
        );
    } else {
        info!("Model escalation disabled; running rule and fuzzy layers only");
    }

    let cancellation_token = CancellationToken::new();
    {
        let token = cancellation_token.clone();
        ctrlc::set_handler(move || {
            warn!("Shutdown requested, finishing current items...");
            token.cancel();
        })
        .context("Failed to install shutdown handler")?;
    }

    let ctx = JobContext::new(
        cancellation_token,
        archive_store.clone(),
        archive_store.clone(),
        archive_store,
        config.reconcile.clone(),
    );

    let jobs: Vec<Box<dyn BackgroundJob>> = match cli_args.job {
        JobSelection::Sources => vec![Box::new(RecordingTypeClassificationJob::new(
            classification_cache,
        ))],
        JobSelection::Songs => vec![Box::new(TrackSongMatchingJob::new(classification_cache))],
        JobSelection::Venues => vec![Box::new(VenueCanonicalizationJob)],
        JobSelection::All => vec![
            Box::new(RecordingTypeClassificationJob::new(
                classification_cache.clone(),
            )),
            Box::new(TrackSongMatchingJob::new(classification_cache)),
            Box::new(VenueCanonicalizationJob),
        ],
    };

    for job in &jobs {
        info!(job = job.id(), "Running {}", job.name());
        match job.execute(&ctx).await {
            Ok(()) => info!(job = job.id(), "Job finished"),
            Err(JobError::Cancelled) => {
                info!(job = job.id(), "Job cancelled; stopping remaining jobs");
                break;
            }
            Err(e) => {
                error!(job = job.id(), error = %e, "Job failed; continuing with remaining jobs");
            }
        }
    }

    Ok(())
}
