//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::notify::message::ParseMode;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub coingecko: CoinGeckoConfig,
    #[serde(default)]
    pub dexscreener: DexScreenerConfig,
    #[serde(default)]
    pub venues: Vec<VenueConfig>,
    /// HTTP timeout for venue catalog requests
    #[serde(default = "default_venue_timeout_ms")]
    pub venue_timeout_ms: u64,
}

/// Sharding, budgets and first-run behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub shard_index: usize,
    #[serde(default = "default_shard_total")]
    pub shard_total: usize,
    /// Whole-run wall clock budget
    #[serde(default = "default_max_run_secs")]
    pub max_run_secs: u64,
    /// Per-venue wall clock budget
    #[serde(default = "default_max_venue_secs")]
    pub max_venue_secs: u64,
    /// 0 means unlimited
    #[serde(default)]
    pub max_notifications_per_run: usize,
    #[serde(default = "default_max_venues_per_run")]
    pub max_venues_per_run: usize,
    #[serde(default = "default_true")]
    pub skip_common_on_first_run: bool,
    #[serde(default = "default_common_tickers")]
    pub common_tickers: Vec<String>,
    #[serde(default = "default_notify_pause_ms")]
    pub notify_pause_ms: u64,
    #[serde(default)]
    pub venue_pause_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            shard_index: 0,
            shard_total: default_shard_total(),
            max_run_secs: default_max_run_secs(),
            max_venue_secs: default_max_venue_secs(),
            max_notifications_per_run: 0,
            max_venues_per_run: default_max_venues_per_run(),
            skip_common_on_first_run: true,
            common_tickers: default_common_tickers(),
            notify_pause_ms: default_notify_pause_ms(),
            venue_pause_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: String,
    /// Save after every venue that produced new keys, not only at run end
    #[serde(default)]
    pub checkpoint_each_venue: bool,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            checkpoint_each_venue: false,
        }
    }
}

/// Telegram endpoint, throttling and retry settings
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_ids: Vec<String>,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub parse_mode: ParseMode,
    #[serde(default = "default_true")]
    pub disable_web_page_preview: bool,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_ids: vec![],
            api_base: default_telegram_api_base(),
            parse_mode: ParseMode::default(),
            disable_web_page_preview: true,
            min_interval_ms: default_min_interval_ms(),
            jitter_ms: default_jitter_ms(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoinGeckoConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_coingecko_url")]
    pub base_url: String,
    /// Pause after each coin detail request
    #[serde(default = "default_polite_delay_ms")]
    pub polite_delay_ms: u64,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_coingecko_url(),
            polite_delay_ms: default_polite_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexScreenerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dexscreener_url")]
    pub base_url: String,
}

impl Default for DexScreenerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_dexscreener_url(),
        }
    }
}

/// One exchange to scan
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VenueConfig {
    pub id: String,
    pub currencies_url: String,
    #[serde(default)]
    pub www_url: Option<String>,
}

fn default_venue_timeout_ms() -> u64 {
    20_000
}

fn default_shard_total() -> usize {
    1
}

fn default_max_run_secs() -> u64 {
    420
}

fn default_max_venue_secs() -> u64 {
    35
}

fn default_max_venues_per_run() -> usize {
    35
}

fn default_common_tickers() -> Vec<String> {
    ["USDT", "USDC", "BTC", "ETH", "BNB", "SOL"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_notify_pause_ms() -> u64 {
    150
}

fn default_state_path() -> String {
    "data/seen_ccxt.json".to_string()
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_min_interval_ms() -> u64 {
    1100
}

fn default_jitter_ms() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_coingecko_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_polite_delay_ms() -> u64 {
    700
}

fn default_dexscreener_url() -> String {
    "https://api.dexscreener.com".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("scan.shard_total", default_shard_total() as i64)?
            .set_default("scan.max_run_secs", default_max_run_secs() as i64)?
            .set_default("state.path", default_state_path())?
            .set_default("notifier.api_base", default_telegram_api_base())?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix WATCH_)
            .add_source(
                config::Environment::with_prefix("WATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.apply_env_fallbacks(|name| std::env::var(name).ok());

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Fill secrets and switches from the plain variables deployments use
    fn apply_env_fallbacks<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.notifier.bot_token.is_empty() {
            if let Some(token) = var("TG_BOT_TOKEN") {
                self.notifier.bot_token = token.trim().to_string();
            }
        }

        if self.notifier.chat_ids.is_empty() {
            if let Some(ids) = var("TG_CHAT_ID") {
                self.notifier.chat_ids = split_list(&ids);
            }
        }

        if let Some(flag) = var("DISABLE_COINGECKO") {
            if matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes") {
                self.coingecko.enabled = false;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scan.shard_total == 0 {
            anyhow::bail!("shard_total must be at least 1");
        }

        if self.scan.shard_index >= self.scan.shard_total {
            anyhow::bail!(
                "shard_index {} out of range for shard_total {}",
                self.scan.shard_index,
                self.scan.shard_total
            );
        }

        if self.notifier.max_attempts == 0 {
            anyhow::bail!("notifier.max_attempts must be positive");
        }

        if self.notifier.max_backoff_ms < self.notifier.base_backoff_ms {
            anyhow::bail!("notifier.max_backoff_ms cannot be below base_backoff_ms");
        }

        let mut ids = HashSet::new();
        for venue in &self.venues {
            let id = venue.id.trim();
            if id.is_empty() {
                anyhow::bail!("Venue with empty id (url: {})", venue.currencies_url);
            }
            if !ids.insert(id.to_lowercase()) {
                anyhow::bail!("Duplicate venue id: {}", id);
            }
            if venue.currencies_url.trim().is_empty() {
                anyhow::bail!("Venue {} has no currencies_url", id);
            }
        }

        if self.venues.is_empty() {
            tracing::warn!("No venues configured - scans will do nothing");
        }

        Ok(())
    }

    /// Whether both Telegram credentials are present
    pub fn has_notifier_credentials(&self) -> bool {
        !self.notifier.bot_token.is_empty() && !self.notifier.chat_ids.is_empty()
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let venues: Vec<&str> = self.venues.iter().map(|v| v.id.as_str()).collect();
        format!(
            r#"Configuration:
  Scan:
    shard: {}/{}
    max_run: {}s
    max_venue: {}s
    max_notifications: {}
    max_venues: {}
    skip_common_on_first_run: {}
  State:
    path: {}
    checkpoint_each_venue: {}
  Notifier:
    api_base: {}
    bot_token: {}
    chat_ids: {}
    parse_mode: {:?}
    min_interval: {}ms (+{}ms jitter)
    max_attempts: {}
  CoinGecko:
    enabled: {}
    base_url: {}
  DexScreener:
    enabled: {}
    base_url: {}
  Venues ({}): {}
"#,
            self.scan.shard_index,
            self.scan.shard_total,
            self.scan.max_run_secs,
            self.scan.max_venue_secs,
            if self.scan.max_notifications_per_run == 0 {
                "unlimited".to_string()
            } else {
                self.scan.max_notifications_per_run.to_string()
            },
            self.scan.max_venues_per_run,
            self.scan.skip_common_on_first_run,
            self.state.path,
            self.state.checkpoint_each_venue,
            mask_url(&self.notifier.api_base),
            if self.notifier.bot_token.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            self.notifier.chat_ids.len(),
            self.notifier.parse_mode,
            self.notifier.min_interval_ms,
            self.notifier.jitter_ms,
            self.notifier.max_attempts,
            self.coingecko.enabled,
            mask_url(&self.coingecko.base_url),
            self.dexscreener.enabled,
            mask_url(&self.dexscreener.base_url),
            venues.len(),
            venues.join(", "),
        )
    }
}

/// Split a comma-separated list, dropping blanks
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            state: StateConfig::default(),
            notifier: NotifierConfig::default(),
            coingecko: CoinGeckoConfig::default(),
            dexscreener: DexScreenerConfig::default(),
            venues: vec![],
            venue_timeout_ms: default_venue_timeout_ms(),
        }
    }
}
