//! Threadbare main entry point
//!
//! Command-line interface for the incremental forum structure miner.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use threadbare::config::load_config_with_hash;
use threadbare::Miner;
use tracing_subscriber::EnvFilter;

/// Threadbare: an incremental forum structure miner
///
/// Mines a forum's categories, threads and posts into per-domain JSON
/// records, revisiting the site over time to pick up only new or changed
/// content.
#[derive(Parser, Debug)]
#[command(name = "threadbare")]
#[command(version)]
#[command(about = "An incremental forum structure miner", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    action: Action,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Discover categories and update every subcategory's thread index
    ReloadThreads,

    /// Update the message log of every known thread
    ReloadPosts,

    /// Print counts from the store without crawling
    Summary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    let miner = Miner::new(&config).context("failed to initialize miner")?;

    match cli.action {
        Action::ReloadThreads => {
            miner.reload_threads().await?;
        }
        Action::ReloadPosts => {
            miner.reload_posts().await?;
        }
        Action::Summary => {
            let summary = miner.summary()?;
            println!("URL:\t\t\t{}", summary.url);
            println!("Domain:\t\t\t{}", summary.domain);
            println!("Amt. Categories:\t{}", summary.categories);
            println!("Amt. SubCategories:\t{}", summary.subcategories);
            println!("Amt. Threads:\t\t{}", summary.threads);
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("threadbare=info,warn"),
            1 => EnvFilter::new("threadbare=debug,info"),
            2 => EnvFilter::new("threadbare=trace,debug"),
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
