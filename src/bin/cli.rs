//! Flogo Dot IO crawler CLI
//!
//! Local execution entry point. The store lives in a directory instead of a
//! bucket and the GitHub token comes from the environment. For AWS Lambda,
//! use `fdio-crawler-lambda`.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use fdio_crawler::{
    config,
    models::{Category, OrderingPolicy, RunContext},
    pipeline::PipelineOrchestrator,
    secrets::EnvSecretStore,
    source::GitHubSource,
    storage::LocalObjectStore,
    store::ContributionStore,
    utils::http,
};

/// Refreshes the Flogo Dot IO contribution database from GitHub
#[derive(Parser, Debug)]
#[command(name = "fdio-crawler", version, about)]
struct Cli {
    /// Directory standing in for the bucket (holds the database object)
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Path to a TOML config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline once: backup, stage, crawl, publish
    Run {
        /// Run identifier (default: derived from the current time)
        #[arg(long)]
        run_id: Option<String>,

        /// Override the recency window in hours
        #[arg(long)]
        window_hours: Option<u32>,

        /// Scan every page instead of stopping at the window edge
        #[arg(long)]
        full_scan: bool,
    },

    /// Validate the configuration
    Validate,

    /// Show record counts of the stored database
    Info {
        /// Database file (default: {storage_dir}/{database_name})
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));

    match cli.command {
        Command::Run {
            run_id,
            window_hours,
            full_scan,
        } => {
            let mut config = config::load_with_env(&config_path)?;
            if let Some(hours) = window_hours {
                config.crawl.window_hours = hours;
            }
            if full_scan {
                config.crawl.ordering = OrderingPolicy::FullScan;
            }
            config.validate()?;

            let now = Utc::now();
            let run_id = run_id.unwrap_or_else(|| format!("local-{}", now.format("%Y%m%dT%H%M%S")));
            let ctx = RunContext::new(run_id, now);

            let objects = Arc::new(LocalObjectStore::new(&cli.storage_dir));
            let secrets = Arc::new(EnvSecretStore::new());
            let client = http::create_async_client(&config.crawl)?;
            let source = Arc::new(GitHubSource::new(client, &config.crawl));

            let report = PipelineOrchestrator::new(&config, objects, secrets, source)
                .run(&ctx)
                .await?;

            for crawl in &report.crawls {
                log::info!(
                    "{}: {} scanned, {} inserted, {} updated, {} skipped",
                    crawl.category,
                    crawl.scanned,
                    crawl.inserted,
                    crawl.updated,
                    crawl.skipped
                );
            }
            log::info!(
                "Published {} ({} records, {} bytes, sha256 {})",
                report.publish.location,
                report.publish.record_count,
                report.publish.bytes,
                report.publish.sha256
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            match config::load_with_env(&config_path) {
                Ok(config) => {
                    log::info!("✓ Config OK");
                    log::info!(
                        "Store: {}/{} (backup {})",
                        config.storage.bucket,
                        config.storage.database_name,
                        config.storage.backup_key()
                    );
                }
                Err(e) => {
                    log::error!("Config validation failed: {}", e);
                    return Err(e.into());
                }
            }
        }

        Command::Info { db } => {
            let config = config::load_with_env(&config_path)?;
            let db_path = db.unwrap_or_else(|| cli.storage_dir.join(&config.storage.database_name));

            if !db_path.exists() {
                log::info!("No database found at {}", db_path.display());
                return Ok(());
            }

            let store = ContributionStore::open_read_only(&db_path)?;
            log::info!("Database: {}", db_path.display());
            for category in Category::ALL {
                log::info!("{}: {} records", category, store.count_category(category)?);
            }
            match store.latest_update()? {
                Some(latest) => log::info!("Last updated: {}", latest),
                None => log::info!("Database is empty."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
