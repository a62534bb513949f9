// src/main.rs

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};

use notion_source::api::{ContentCache, ContentTreeLoader, DiskStore, Fetcher, NotionHttpClient};
use notion_source::config::{CommandLineInput, SourceOptions};
use notion_source::error::AppError;
use notion_source::ingest::{DocumentSink, IngestionDriver};
use notion_source::model::Document;
use notion_source::types::RenderMode;

/// Sets up logging configuration.
fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let log_file_path = std::env::temp_dir().join("notion_source.log");
    if let Some(parent) = log_file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pattern = if verbose {
        "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}"
    } else {
        "{m}{n}"
    };

    let stdout_appender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}",
        )))
        .build(&log_file_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout_appender)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("file", Box::new(file_appender)),
        )
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(log_level),
        )?;

    log4rs::init_config(config)?;
    log::debug!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(())
}

/// Writes one file per document under a fixed directory, named by slug
/// when one exists, by page id otherwise.
struct FileSink {
    output_dir: PathBuf,
    extension: &'static str,
}

#[async_trait::async_trait]
impl DocumentSink for FileSink {
    async fn emit(&self, document: Document) -> Result<(), AppError> {
        let stem = document
            .slug
            .as_deref()
            .filter(|slug| !slug.is_empty())
            .unwrap_or(&document.id);
        let path = self
            .output_dir
            .join(format!("{}.{}", stem, self.extension));

        tokio::fs::write(&path, &document.body)
            .await
            .map_err(|err| AppError::Sink {
                id: document.id.clone(),
                message: err.to_string(),
            })?;
        log::info!("Wrote '{}' to {}", document.title, path.display());
        Ok(())
    }
}

async fn execute_ingestion(options: SourceOptions) -> Result<(), AppError> {
    let remote = Arc::new(NotionHttpClient::new(&options.token)?);

    let cache = if options.cache_enabled {
        let cache_dir = std::env::temp_dir().join("notion_source_cache");
        ContentCache::new(Arc::new(DiskStore::new(cache_dir)?), options.cache_max_age)
    } else {
        log::info!("Cache disabled, all requests go to the Notion API");
        ContentCache::disabled()
    };

    let fetcher = match options.retry_budget {
        Some(budget) => Fetcher::with_budget(budget),
        None => Fetcher::new(),
    };

    let loader = ContentTreeLoader::new(remote, fetcher, cache, options.chunk_size);

    tokio::fs::create_dir_all(&options.output_dir).await?;
    let sink = Arc::new(FileSink {
        output_dir: options.output_dir.clone(),
        extension: match options.mode {
            RenderMode::Markdown => "md",
            RenderMode::Html => "html",
        },
    });

    let driver = IngestionDriver::new(
        loader,
        sink,
        options.mode,
        options.lower_title_level,
        options.database_id.clone(),
        options.filter.clone(),
    )
    .with_preamble(options.props_to_preamble);

    match options.refresh_interval {
        Some(interval) => {
            log::info!("Refreshing every {}s", interval.as_secs());
            Arc::new(driver).run_periodically(interval).await
        }
        None => driver.run().await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CommandLineInput::parse();

    setup_logging(cli.verbose)?;

    let options = SourceOptions::resolve(cli)?;

    execute_ingestion(options).await?;

    Ok(())
}
