// src/config.rs
use crate::error::AppError;
use crate::types::RenderMode;
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Parsed command-line input.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineInput {
    /// Notion integration token (also read from NOTION_TOKEN)
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    pub token: String,

    /// The database to ingest
    #[arg(long)]
    pub database_id: String,

    /// Notion query filter as a JSON object, passed through verbatim
    #[arg(long)]
    pub filter: Option<String>,

    /// Directory to write documents into
    #[arg(short = 'o', long, default_value = "./content")]
    pub output_dir: String,

    /// Emit HTML documents instead of markdown
    #[arg(long, default_value_t = false)]
    pub html: bool,

    /// Shift headings one level down, reserving h1 for the page title
    #[arg(long, default_value_t = false)]
    pub lower_title_level: bool,

    /// Prepend normalized page properties as a fenced preamble
    #[arg(long, default_value_t = false)]
    pub props_to_preamble: bool,

    /// Disable content caching (always fetch fresh data)
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    /// Cache entry lifetime in seconds (0 = no expiry)
    #[arg(long, default_value_t = 0)]
    pub cache_max_age: u64,

    /// Pages enriched concurrently per batch (default: whole listing at once)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Give up on a retried request after this many seconds (default: retry forever)
    #[arg(long)]
    pub retry_budget: Option<u64>,

    /// Re-run the ingestion pass on this interval, in seconds
    #[arg(long)]
    pub refresh_interval: Option<u64>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Resolved ingestion options — validated and ready to wire the pipeline.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub token: String,
    pub database_id: String,
    pub filter: Option<Value>,
    pub output_dir: PathBuf,
    pub mode: RenderMode,
    pub lower_title_level: bool,
    pub props_to_preamble: bool,
    pub cache_enabled: bool,
    /// `None` means entries never expire by age.
    pub cache_max_age: Option<Duration>,
    pub chunk_size: Option<usize>,
    pub retry_budget: Option<Duration>,
    pub refresh_interval: Option<Duration>,
    pub verbose: bool,
}

impl SourceOptions {
    /// Resolves complete ingestion options from CLI input.
    pub fn resolve(cli: CommandLineInput) -> Result<Self, AppError> {
        if cli.token.trim().is_empty() {
            return Err(AppError::Configuration(
                "Notion token must not be empty".to_string(),
            ));
        }
        if cli.database_id.trim().is_empty() {
            return Err(AppError::Configuration(
                "database id must not be empty".to_string(),
            ));
        }

        let filter = cli
            .filter
            .as_deref()
            .map(serde_json::from_str::<Value>)
            .transpose()
            .map_err(|err| AppError::Configuration(format!("invalid filter JSON: {}", err)))?;

        let mode = if cli.html {
            RenderMode::Html
        } else {
            RenderMode::Markdown
        };

        Ok(SourceOptions {
            token: cli.token,
            database_id: cli.database_id,
            filter,
            output_dir: PathBuf::from(cli.output_dir),
            mode,
            lower_title_level: cli.lower_title_level,
            props_to_preamble: cli.props_to_preamble,
            cache_enabled: !cli.no_cache,
            cache_max_age: (cli.cache_max_age > 0).then(|| Duration::from_secs(cli.cache_max_age)),
            chunk_size: cli.chunk_size,
            retry_budget: cli.retry_budget.map(Duration::from_secs),
            refresh_interval: cli.refresh_interval.map(Duration::from_secs),
            verbose: cli.verbose,
        })
    }
}
