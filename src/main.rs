//! Boardwalk main entry point
//!
//! This is the command-line interface for the boardwalk crawl orchestrator.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use boardwalk::config::load_config_with_hash;
use boardwalk::crawler::{HttpFetcher, ImageItemWorker, Orchestrator, SelectorListParser};
use boardwalk::dedup::Deduplicator;
use boardwalk::storage::SqliteStore;
use tracing_subscriber::EnvFilter;

/// Boardwalk: a resumable BBS and news-feed crawler
///
/// Boardwalk crawls configured boards page by page, downloads the images
/// behind each new item through a concurrent worker pool, and checkpoints
/// its progress so interrupted crawls pick up where they left off.
#[derive(Parser, Debug)]
#[command(name = "boardwalk")]
#[command(version)]
#[command(about = "A resumable BBS and news-feed crawler", long_about = None)]
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

    /// Start from this list page, overriding the checkpoint cursor
    #[arg(long, value_name = "PAGE")]
    start_page: Option<u32>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["status", "clear_checkpoint"])]
    dry_run: bool,

    /// Show stored checkpoints and exit
    #[arg(long, conflicts_with_all = ["dry_run", "clear_checkpoint"])]
    status: bool,

    /// Delete the checkpoint for the configured (site, board) and exit
    #[arg(long, conflicts_with_all = ["dry_run", "status"])]
    clear_checkpoint: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, _config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.status {
        handle_status(&config)?;
    } else if cli.clear_checkpoint {
        handle_clear_checkpoint(&config)?;
    } else {
        handle_crawl(config, cli.start_page).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("boardwalk=info,warn"),
            1 => EnvFilter::new("boardwalk=debug,info"),
            2 => EnvFilter::new("boardwalk=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &boardwalk::Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Boardwalk Dry Run ===\n");

    println!("Site:");
    println!("  Name: {}", config.site.name);
    println!("  Base URL: {}", config.site.base_url);
    println!("  Board: {}", config.site.board);
    println!("  Item selector: {}", config.site.selectors.item);
    println!("  Link selector: {}", config.site.selectors.link);

    println!("\nCrawler:");
    if config.crawler.max_pages > 0 {
        println!("  Max pages: {}", config.crawler.max_pages);
    } else {
        println!("  Max pages: unlimited");
    }
    println!("  Resume: {}", config.crawler.resume);
    println!("  No-new-page limit: {}", config.crawler.no_new_page_limit);

    println!("\nQueue:");
    println!(
        "  Workers: {} ({}..{})",
        config.queue.initial_workers, config.queue.min_workers, config.queue.max_workers
    );
    println!("  Capacity: {}", config.queue.queue_capacity);
    println!("  Error threshold: {}", config.queue.error_threshold);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Images: {}", config.storage.image_dir);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl {} starting from {}",
        config.site.board, config.site.base_url
    );

    Ok(())
}

/// Handles the --status mode: lists stored checkpoints
fn handle_status(config: &boardwalk::Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::new(Path::new(&config.storage.database_path))?;
    let manager = boardwalk::CheckpointManager::new(store);

    let checkpoints = manager.list();
    if checkpoints.is_empty() {
        println!("No checkpoints stored");
        return Ok(());
    }

    println!("Database: {}\n", config.storage.database_path);
    for cp in checkpoints {
        println!(
            "{}/{}: {} (page {}, {} items seen, {} completed, {} failed, {} images)",
            cp.site,
            cp.board,
            cp.status.to_db_string(),
            cp.current_page,
            cp.seen_ids.len(),
            cp.stats.items_completed,
            cp.stats.items_failed,
            cp.stats.images_downloaded,
        );
        if let Some(err) = &cp.stats.last_error {
            println!("  last error: {}", err);
        }
    }

    Ok(())
}

/// Handles the --clear-checkpoint mode
fn handle_clear_checkpoint(config: &boardwalk::Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::new(Path::new(&config.storage.database_path))?;
    let mut manager = boardwalk::CheckpointManager::new(store);

    if manager.clear(&config.site.name, &config.site.board) {
        println!(
            "✓ Cleared checkpoint for {}/{}",
            config.site.name, config.site.board
        );
    } else {
        println!(
            "No checkpoint stored for {}/{}",
            config.site.name, config.site.board
        );
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: boardwalk::Config,
    start_page: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(config);
    let image_dir = PathBuf::from(&config.storage.image_dir);

    // Rehydrate dedup state from images already on disk
    let mut dedup = Deduplicator::new(&config.dedup);
    let loaded = dedup.load_existing_hashes(&image_dir)?;
    if loaded > 0 {
        tracing::info!("Loaded {} existing image hashes", loaded);
    }
    let dedup = Arc::new(tokio::sync::Mutex::new(dedup));

    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
    let parser = Arc::new(SelectorListParser::new(&config.site.selectors)?);
    let worker = Arc::new(ImageItemWorker::new(
        Arc::clone(&fetcher),
        &config.site.selectors.detail_images,
        Arc::clone(&dedup),
        image_dir,
    )?);

    let store = SqliteStore::new(Path::new(&config.storage.database_path))?;
    let mut orchestrator = Orchestrator::new(
        Arc::clone(&config),
        store,
        fetcher,
        parser,
        Arc::clone(&worker) as Arc<dyn boardwalk::crawler::ItemWorker>,
        None,
    );

    let summary = match orchestrator.run(start_page).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    // Fold this run's downloads into the durable counters
    let site = &config.site.name;
    let board = &config.site.board;
    let manager = orchestrator.checkpoints_mut();
    if let Some(mut cp) = manager.load(site, board) {
        cp.stats.images_downloaded += worker.images_downloaded();
        manager.save(&mut cp);
    }

    let dedup_stats = dedup.lock().await.stats();
    tracing::info!(
        "Run finished: {:?}, {} pages, {} new items ({} completed, {} failed), {} images saved, {:.1}% duplicate rate",
        summary.outcome,
        summary.pages_crawled,
        summary.items_found,
        summary.items_completed,
        summary.items_failed,
        worker.images_downloaded(),
        dedup_stats.duplicate_rate() * 100.0,
    );

    Ok(())
}
