//! Carfax Crawler CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use carfax_crawler::{
    config::{INPUT_FILE, load_all, load_input},
    error::Result,
    models::CrawlInput,
    pipeline,
    render::{HttpRenderer, ProxyRotation},
    storage::LocalStorage,
    utils::console,
};

/// Key of the run summary in the key-value store.
const SUMMARY_KEY: &str = "SUMMARY";

/// Carfax used-vehicle listing crawler
#[derive(Parser, Debug)]
#[command(
    name = "carfax-crawler",
    version,
    about = "Adaptive multi-strategy crawler for used-vehicle listings"
)]
struct Cli {
    /// Path to storage directory containing config.toml, input.json and outputs
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl listings into the dataset
    Crawl {
        /// Input file (default: {storage_dir}/input.json)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Start URL; repeatable, replaces the input's start URLs
        #[arg(long)]
        url: Vec<String>,

        /// Target number of records
        #[arg(long)]
        results_wanted: Option<usize>,

        /// Page budget per start URL
        #[arg(long)]
        max_pages: Option<u32>,

        /// Vehicle make for the built search URL
        #[arg(long)]
        make: Option<String>,

        /// Vehicle model for the built search URL
        #[arg(long)]
        model: Option<String>,
    },

    /// Validate configuration and input files
    Validate,

    /// Show dataset and last run info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Apply command-line overrides on top of the input file.
fn apply_overrides(
    mut input: CrawlInput,
    url: Vec<String>,
    results_wanted: Option<usize>,
    max_pages: Option<u32>,
    make: Option<String>,
    model: Option<String>,
) -> CrawlInput {
    if !url.is_empty() {
        input.start_urls = url;
        input.start_url = None;
        input.url = None;
    }
    if let Some(n) = results_wanted {
        input.results_wanted = n.max(1);
    }
    if let Some(n) = max_pages {
        input.max_pages = n.max(1);
    }
    if make.is_some() || model.is_some() {
        input.filters.make = make;
        input.filters.model = model;
    }
    input
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Carfax crawler starting...");

    match cli.command {
        Command::Crawl {
            input,
            url,
            results_wanted,
            max_pages,
            make,
            model,
        } => {
            let (config, file_input) = load_all(&cli.storage_dir)?;
            let file_input = match input {
                Some(path) => load_input(&path)?,
                None => file_input,
            };
            let input = apply_overrides(file_input, url, results_wanted, max_pages, make, model);
            log::info!("Loaded configuration from {}", cli.storage_dir.display());

            let storage = Arc::new(LocalStorage::new(
                &cli.storage_dir,
                &config.output.dataset_name,
            ));
            let identity = Arc::new(ProxyRotation::new(config.crawler.proxies.clone()));
            let renderer = Arc::new(HttpRenderer::new(&config, identity.clone())?);

            let summary = pipeline::run_crawler(
                &config,
                &input,
                renderer,
                identity,
                storage.clone(),
                storage.clone(),
            )
            .await?;
            storage.write_json(SUMMARY_KEY, &summary).await?;

            console::summary(
                "Crawl",
                &[
                    ("Saved", format!("{}/{}", summary.saved, summary.results_wanted)),
                    ("Start URLs", summary.urls.len().to_string()),
                    ("Failed URLs", summary.failed_urls().to_string()),
                    ("Dataset", storage.dataset_path().display().to_string()),
                ],
            );
        }

        Command::Validate => {
            pipeline::run_validate(&cli.storage_dir)?;
            log::info!("All validations passed!");
        }

        Command::Info => {
            let (config, _) = load_all(&cli.storage_dir)?;
            let storage = LocalStorage::new(&cli.storage_dir, &config.output.dataset_name);

            log::info!("Storage directory: {}", storage.root_dir().display());
            log::info!(
                "Input: {}",
                if cli.storage_dir.join(INPUT_FILE).exists() {
                    "exists"
                } else {
                    "not found"
                }
            );

            let items = storage.read_dataset().await?;
            log::info!(
                "Dataset {}: {} records",
                storage.dataset_path().display(),
                items.len()
            );

            let summary_path = storage.record_path(SUMMARY_KEY, "json");
            match std::fs::read_to_string(&summary_path)
                .ok()
                .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
            {
                Some(summary) => {
                    if let Some(finished) = summary.get("finished_at") {
                        log::info!("Last run finished: {}", finished);
                    }
                    if let Some(saved) = summary.get("saved") {
                        log::info!("Last run saved: {}", saved);
                    }
                }
                None => log::info!("No run summary found yet."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
