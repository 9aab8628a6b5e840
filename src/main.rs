//! Screen Atlas main entry point
//!
//! This is the command-line interface for the Screen Atlas crawler.

use anyhow::Context;
use clap::Parser;
use screen_atlas::browser::{BrowserEngine, HttpEngine, HttpSettings};
use screen_atlas::config::{load_config_with_hash, validate, Config, EngineKind};
use screen_atlas::crawler::SiteCrawler;
use screen_atlas::output::{
    generate_markdown_summary, load_statistics, print_statistics, write_inventory_json,
};
use screen_atlas::snapshot::{FsSnapshotStore, SnapshotStore};
use screen_atlas::storage::{open_storage, InventoryStore};
use screen_atlas::{CrawlConfig, SiteInventory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Screen Atlas: an authenticated screen crawler
///
/// Screen Atlas walks a web application behind a login, captures a snapshot
/// of every distinct screen and writes a structured inventory of what each
/// screen contains.
#[derive(Parser, Debug)]
#[command(name = "screen-atlas")]
#[command(version)]
#[command(about = "An authenticated screen crawler", long_about = None)]
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

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics of the latest stored run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Regenerate the markdown summary from the latest stored run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    validate(&config).context("Invalid configuration")?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let crawl_config = CrawlConfig::from_config(&config).context("Invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config, &crawl_config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else {
        handle_crawl(&config, crawl_config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("screen_atlas=info,warn"),
            1 => EnvFilter::new("screen_atlas=debug,info"),
            2 => EnvFilter::new("screen_atlas=trace,debug"),
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

/// Handles the --dry-run mode: shows the resolved crawl settings
fn handle_dry_run(config: &Config, crawl: &CrawlConfig) {
    println!("=== Screen Atlas Dry Run ===\n");

    println!("Crawl:");
    println!("  Base URL: {}", crawl.base_url);
    println!("  Max pages: {}", crawl.max_pages);
    println!("  Max depth: {}", crawl.max_depth);
    println!("  Workers: {}", crawl.workers);
    println!("  Page timeout: {:?}", crawl.page_timeout);
    println!("  Settle budget: {:?}", crawl.settle);
    match crawl.deadline {
        Some(deadline) => println!("  Deadline: {:?}", deadline),
        None => println!("  Deadline: none"),
    }
    println!("  Probes per page: {}", crawl.max_probes_per_page);
    println!("  Similarity threshold: {}", crawl.similarity_threshold);

    println!("\nAuth:");
    match &crawl.auth {
        Some(auth) => println!("  Strategy: {}", auth.strategy()),
        None => println!("  Strategy: none (unauthenticated)"),
    }

    println!("\nScope:");
    println!("  Include: {:?}", config.crawl.scope.include);
    println!("  Exclude: {:?}", config.crawl.scope.exclude);

    println!("\nBrowser:");
    println!("  Engine: {:?}", config.browser.engine);
    println!(
        "  Viewport: {}x{}",
        config.browser.viewport_width, config.browser.viewport_height
    );
    println!("  User agent: {}", config.browser.user_agent);

    println!("\nSnapshots:");
    println!("  Format: {}", crawl.snapshot.format.extension());
    println!("  Max width: {}", crawl.snapshot.max_width);
    println!("  Directory: {}", config.output.snapshot_dir);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Inventory: {}", config.output.inventory_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics of the latest stored run
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;

    match load_statistics(&storage)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No crawl runs stored yet."),
    }

    Ok(())
}

/// Handles the --export-summary mode: rewrites the markdown summary
fn handle_export_summary(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Inventory Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;

    tracing::info!("Loading latest inventory from database...");
    let Some(inventory) = storage.load_latest_inventory()? else {
        println!("No crawl runs stored yet.");
        return Ok(());
    };
    tracing::info!(
        "Loaded inventory of {} ({} screens)",
        inventory.base_url,
        inventory.total_screens()
    );

    generate_markdown_summary(&inventory, Path::new(&config.output.summary_path))?;
    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, crawl: CrawlConfig, config_hash: &str) -> anyhow::Result<()> {
    let store: Arc<dyn SnapshotStore> = Arc::new(
        FsSnapshotStore::new(&config.output.snapshot_dir)
            .context("Failed to prepare snapshot directory")?,
    );

    let inventory = match config.browser.engine {
        EngineKind::Http => {
            let engine = HttpEngine::new(HttpSettings {
                user_agent: config.browser.user_agent.clone(),
                timeout: crawl.page_timeout,
            });
            run_crawl(engine, crawl, store).await?
        }
        EngineKind::Chrome => run_chrome_crawl(config, crawl, store).await?,
    };

    write_outputs(config, &inventory, config_hash);
    Ok(())
}

#[cfg(feature = "chrome")]
async fn run_chrome_crawl(
    config: &Config,
    crawl: CrawlConfig,
    store: Arc<dyn SnapshotStore>,
) -> anyhow::Result<SiteInventory> {
    use screen_atlas::browser::{ChromeEngine, ChromeSettings};

    let engine = ChromeEngine::launch(ChromeSettings {
        headless: config.browser.headless,
        viewport: (config.browser.viewport_width, config.browser.viewport_height),
        user_agent: Some(config.browser.user_agent.clone()),
        timeout: crawl.page_timeout,
    })
    .await
    .context("Failed to launch Chromium")?;

    run_crawl(engine, crawl, store).await
}

#[cfg(not(feature = "chrome"))]
async fn run_chrome_crawl(
    _config: &Config,
    _crawl: CrawlConfig,
    _store: Arc<dyn SnapshotStore>,
) -> anyhow::Result<SiteInventory> {
    anyhow::bail!("browser.engine = \"chrome\" requires screen-atlas to be built with the `chrome` feature")
}

/// Crawls with the given engine, cancelling on Ctrl-C
async fn run_crawl<E: BrowserEngine>(
    engine: E,
    crawl: CrawlConfig,
    store: Arc<dyn SnapshotStore>,
) -> anyhow::Result<SiteInventory> {
    tracing::info!(
        "Crawling {} with the {} engine ({} workers, max {} pages)",
        crawl.base_url,
        engine.name(),
        crawl.workers,
        crawl.max_pages
    );

    let crawler = SiteCrawler::new(engine, crawl, store);

    let canceller = crawler.canceller();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages...");
            canceller.cancel();
        }
    });

    let result = crawler.crawl().await;
    interrupt.abort();

    let inventory = result.context("Crawl aborted")?;
    tracing::info!(
        "Crawl finished: {} screens, {} templates, {} skipped",
        inventory.total_screens(),
        inventory.templates.len(),
        inventory.skipped.len()
    );
    Ok(inventory)
}

/// Writes the JSON inventory, the markdown summary and the database record
///
/// Failures are logged; the inventory has already been produced.
fn write_outputs(config: &Config, inventory: &SiteInventory, config_hash: &str) {
    let inventory_path = Path::new(&config.output.inventory_path);
    match write_inventory_json(inventory, inventory_path) {
        Ok(()) => tracing::info!("Inventory written to {}", inventory_path.display()),
        Err(e) => tracing::error!("Failed to write inventory: {}", e),
    }

    let summary_path = Path::new(&config.output.summary_path);
    match generate_markdown_summary(inventory, summary_path) {
        Ok(()) => tracing::info!("Summary written to {}", summary_path.display()),
        Err(e) => tracing::error!("Failed to write summary: {}", e),
    }

    let saved = open_storage(Path::new(&config.output.database_path))
        .and_then(|mut storage| storage.save_inventory(inventory, config_hash));
    match saved {
        Ok(run_id) => tracing::info!("Stored as run {} in {}", run_id, config.output.database_path),
        Err(e) => tracing::error!("Failed to store inventory: {}", e),
    }
}
