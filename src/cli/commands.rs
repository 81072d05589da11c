//! CLI command implementations

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::notify::notifier::Notifier;
use crate::notify::telegram::{LogTransport, NotifyTransport, TelegramTransport};
use crate::resolve::cache::LookupCache;
use crate::resolve::lookup::{CatalogLookup, PairSearch};
use crate::resolve::metadata::CurrencyMeta;
use crate::resolve::pipeline::IdentityResolver;
use crate::scan::orchestrator::Orchestrator;
use crate::sources::coingecko::CoinGeckoClient;
use crate::sources::dexscreener::DexScreenerClient;
use crate::sources::venue::HttpVenueSource;
use crate::state::SeenStore;

/// Destination used when a dry run has no chat ids configured
const DRY_RUN_DESTINATION: &str = "dry-run";

/// Resolver wired to whichever lookup services are enabled
pub fn build_resolver(config: &Config) -> Result<IdentityResolver> {
    let catalog: Option<Arc<dyn CatalogLookup>> = if config.coingecko.enabled {
        Some(Arc::new(CoinGeckoClient::new(&config.coingecko)?))
    } else {
        info!("CoinGecko lookups disabled");
        None
    };

    let pairs: Option<Arc<dyn PairSearch>> = if config.dexscreener.enabled {
        Some(Arc::new(DexScreenerClient::new(&config.dexscreener)?))
    } else {
        info!("DexScreener lookups disabled");
        None
    };

    Ok(IdentityResolver::new(catalog, pairs))
}

/// Run one scan of this shard's venues
pub async fn scan(
    config: &Config,
    shard_index: Option<usize>,
    shard_total: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(index) = shard_index {
        config.scan.shard_index = index;
    }
    if let Some(total) = shard_total {
        config.scan.shard_total = total;
    }
    config.validate()?;

    let transport: Arc<dyn NotifyTransport> = if dry_run {
        warn!("Running in DRY-RUN mode - notifications are logged, state is not saved");
        if config.notifier.chat_ids.is_empty() {
            config.notifier.chat_ids = vec![DRY_RUN_DESTINATION.to_string()];
        }
        Arc::new(LogTransport)
    } else {
        if config.notifier.bot_token.is_empty() {
            return Err(Error::MissingEnvVar("TG_BOT_TOKEN".into()).into());
        }
        if config.notifier.chat_ids.is_empty() {
            return Err(Error::MissingEnvVar("TG_CHAT_ID".into()).into());
        }
        Arc::new(TelegramTransport::new(&config.notifier)?)
    };

    let mut store = SeenStore::load(&config.state.path)?;
    if dry_run {
        store.detach();
    }

    let source = Arc::new(HttpVenueSource::new(Duration::from_millis(config.venue_timeout_ms))?);
    let notifier = Notifier::from_config(&config.notifier, transport);
    let orchestrator = Orchestrator::new(&config, source, build_resolver(&config)?, notifier);

    let report = orchestrator.run(&config.venues, &mut store).await?;

    println!("\n=== SCAN REPORT ===\n");
    println!("Shard:              {}/{}", config.scan.shard_index, config.scan.shard_total);
    println!("Venues visited:     {}", report.venues_visited);
    println!("Venues failed:      {}", report.venues_failed);
    println!("Venues truncated:   {}", report.venues_truncated);
    println!("New listings:       {}", report.new_keys);
    println!("Notified:           {}", report.notified);
    println!("No signal:          {}", report.suppressed_no_signal);
    println!("Skipped (common):   {}", report.skipped_common);
    match report.stopped_by {
        Some(stop) => println!("Stopped early:      {}", stop),
        None => println!("Stopped early:      no"),
    }
    println!("Known listings:     {}", store.len());

    Ok(())
}

/// Resolve a bare ticker through the external lookups and print the result
pub async fn resolve(config: &Config, ticker: &str) -> Result<()> {
    let resolver = build_resolver(config)?;
    let mut cache = LookupCache::new();

    let result = resolver.resolve(ticker, &CurrencyMeta::default(), &mut cache).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.is_informative() {
        warn!(ticker = %ticker, "No contract or pair found");
    }
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
