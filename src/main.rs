//! Press-Sieve main entry point
//!
//! This is the command-line interface for the Press-Sieve article pipeline.

use anyhow::Context;
use clap::Parser;
use press_sieve::analysis::ChatAnalysisClient;
use press_sieve::config::{load_config_with_hash, resolve_api_key, Config};
use press_sieve::pipeline::{
    load_statistics, print_statistics, FeedItem, FileSource, ItemSource, Pipeline, QueueSource,
};
use press_sieve::queue::PersistentQueue;
use press_sieve::storage::{self, open_storage};
use press_sieve::PageResourcePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Press-Sieve: a feed article acquisition pipeline
///
/// Press-Sieve fetches the pages behind feed entries, extracts the article
/// text, summarises and classifies it and stores deduplicated records.
#[derive(Parser, Debug)]
#[command(name = "press-sieve")]
#[command(version)]
#[command(about = "A feed article acquisition pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run one batch from a JSON array of feed items instead of the queue
    #[arg(long, value_name = "FILE", conflicts_with_all = ["enqueue", "stats", "dry_run"])]
    items: Option<PathBuf>,

    /// Append feed items from a JSON file to the persistent queue and exit
    #[arg(long, value_name = "FILE", conflicts_with_all = ["items", "stats", "dry_run"])]
    enqueue: Option<PathBuf>,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["items", "enqueue", "dry_run"])]
    stats: bool,

    /// Validate config (including credentials) and exit
    #[arg(long, conflicts_with_all = ["items", "enqueue", "stats"])]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(path) = &cli.enqueue {
        handle_enqueue(&config, path).await
    } else {
        handle_batch(config, &config_hash, cli.items.as_deref()).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("press_sieve=info,warn"),
            1 => EnvFilter::new("press_sieve=debug,info"),
            2 => EnvFilter::new("press_sieve=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and credentials
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Press-Sieve Dry Run ===\n");

    println!("Fetcher:");
    println!("  Timeout: {}s", config.fetcher.timeout_secs);
    println!("  User agent: {}", config.fetcher.user_agent);
    println!(
        "  Rendered domains ({}): {}",
        config.fetcher.rendered_domains.len(),
        config.fetcher.rendered_domains.join(", ")
    );

    println!("\nPage Pool:");
    println!("  Size: {}", config.pool.size);
    println!("  Restart threshold: {} leases", config.pool.restart_threshold);
    println!(
        "  Navigation timeout: {}s",
        config.pool.navigation_timeout_secs
    );

    println!("\nExtraction:");
    println!("  Minimum body: {} chars", config.extraction.min_body_chars);
    println!("  Domain handlers ({}):", config.extraction.handlers.len());
    for handler in &config.extraction.handlers {
        println!("    - {} ({:?})", handler.domain, handler.kind);
    }

    println!("\nAnalysis:");
    println!("  Endpoint: {}", config.analysis.base_url);
    println!("  Model: {}", config.analysis.model);
    println!("  Taxonomy: {} labels", config.analysis.taxonomy.len());
    println!(
        "  Retry: {} tries, {}ms apart",
        config.retry.max_tries, config.retry.delay_ms
    );

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Queue: {}", config.queue.path);
    println!("  Concurrency: {}", config.pipeline.concurrency);

    resolve_api_key(&config.analysis)?;
    println!("\n✓ Configuration is valid");
    println!("✓ Analysis credentials found");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_storage(Path::new(&config.storage.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --enqueue mode: appends items to the persistent queue
async fn handle_enqueue(config: &Config, path: &Path) -> anyhow::Result<()> {
    let items = FileSource::new(path).load_items().await?;
    let queue: PersistentQueue<FeedItem> = PersistentQueue::open(&config.queue.path)?;
    let added = queue.extend(items)?;
    queue.flush()?;

    println!(
        "✓ Queued {} item(s); {} waiting in {}",
        added,
        queue.size(),
        queue.path().display()
    );
    Ok(())
}

/// Handles the main batch run
async fn handle_batch(
    config: Config,
    config_hash: &str,
    items_file: Option<&Path>,
) -> anyhow::Result<()> {
    // Credentials are checked before any item is touched
    let api_key = resolve_api_key(&config.analysis)?;

    let storage = storage::share(open_storage(Path::new(&config.storage.database_path))?);
    let client = Arc::new(ChatAnalysisClient::new(&config.analysis, api_key)?);

    let pool = if config.fetcher.rendered_domains.is_empty() {
        None
    } else {
        Some(Arc::new(PageResourcePool::chromium(&config.pool)))
    };

    let pipeline = Pipeline::from_config(&config, config_hash, storage, pool.clone(), client)?;

    let (queue, source): (Option<Arc<PersistentQueue<FeedItem>>>, Box<dyn ItemSource>) =
        match items_file {
            Some(path) => (None, Box::new(FileSource::new(path))),
            None => {
                let queue = Arc::new(PersistentQueue::open(&config.queue.path)?);
                (Some(Arc::clone(&queue)), Box::new(QueueSource::new(queue)))
            }
        };

    let items = source.load_items().await?;
    tracing::info!(source = source.name(), "Loaded {} item(s)", items.len());
    let pending = items.clone();

    let result = pipeline
        .run_batch_with_shutdown(items, shutdown_signal())
        .await;

    if let Some(pool) = &pool {
        pool.shutdown().await;
    }

    if let Some(queue) = &queue {
        // Unfinished items go back so the next run picks them up
        let finished = result.as_ref().map(|s| s.total()).unwrap_or(0);
        if finished < pending.len() as u64 {
            let requeued = queue.extend(pending)?;
            tracing::warn!("Requeued {} item(s) from an unfinished batch", requeued);
        }
        queue.flush()?;
    }

    let summary = result?;
    println!("✓ Batch finished: {}", summary);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
