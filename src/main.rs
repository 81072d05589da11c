//! Listing Watch - new exchange listing scanner
//!
//! Run one `scan` per shard on a schedule; the seen-set file is shared
//! between shards and merged on save.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use listing_watch::cli::commands;
use listing_watch::config::Config;

/// Listing Watch - detects new exchange listings and notifies Telegram
#[derive(Parser)]
#[command(name = "watch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "watch.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan this shard's venues once
    Scan {
        /// Shard to scan (overrides config)
        #[arg(long, env = "SHARD_INDEX")]
        shard_index: Option<usize>,

        /// Number of shards (overrides config)
        #[arg(long, env = "SHARD_TOTAL")]
        shard_total: Option<usize>,

        /// Log notifications instead of sending; do not save state
        #[arg(long)]
        dry_run: bool,
    },

    /// Resolve a ticker via CoinGecko and DexScreener
    Resolve {
        /// Ticker symbol, e.g. PEPE
        ticker: String,
    },

    /// Show current configuration (secrets masked)
    Config,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("listing_watch=info".parse().unwrap());

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.json_logs);

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Scan {
            shard_index,
            shard_total,
            dry_run,
        } => commands::scan(&config, shard_index, shard_total, dry_run).await,
        Commands::Resolve { ticker } => commands::resolve(&config, &ticker).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
