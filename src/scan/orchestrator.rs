//! Scan orchestrator
//!
//! Walks this shard's venues, finds tickers missing from the seen-set,
//! records them before doing anything else, resolves their identity and
//! notifies when there is something worth linking to. Per-venue failures
//! are logged and skipped; budgets end the run early without error.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{Config, ScanConfig, VenueConfig};
use crate::error::Result;
use crate::notify::message::{ListingAlert, NotificationMessage, ParseMode};
use crate::notify::notifier::Notifier;
use crate::resolve::cache::LookupCache;
use crate::resolve::pipeline::{normalize_ticker, IdentityResolver};
use crate::scan::budget::{shard_venues, BudgetStop, RunBudget};
use crate::sources::venue::{CurrencyListing, VenueSource};
use crate::state::{now_stamp, ListingKey, SeenStore};

/// Outcome of one scan run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub venues_visited: usize,
    pub venues_failed: usize,
    /// Venues cut short by their own time budget
    pub venues_truncated: usize,
    pub new_keys: usize,
    pub notified: usize,
    /// New keys with neither contract nor pair URL
    pub suppressed_no_signal: usize,
    pub skipped_common: usize,
    pub stopped_by: Option<BudgetStop>,
}

/// Mutable state threaded through one run
struct RunState {
    budget: RunBudget,
    cache: LookupCache,
    report: ScanReport,
    first_run: bool,
    common: HashSet<String>,
}

pub struct Orchestrator {
    source: Arc<dyn VenueSource>,
    resolver: IdentityResolver,
    notifier: Notifier,
    settings: ScanConfig,
    destinations: Vec<String>,
    parse_mode: ParseMode,
    checkpoint_each_venue: bool,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        source: Arc<dyn VenueSource>,
        resolver: IdentityResolver,
        notifier: Notifier,
    ) -> Self {
        Self {
            source,
            resolver,
            notifier,
            settings: config.scan.clone(),
            destinations: config.notifier.chat_ids.clone(),
            parse_mode: config.notifier.parse_mode,
            checkpoint_each_venue: config.state.checkpoint_each_venue,
        }
    }

    /// Scan this shard's slice of `venues`.
    ///
    /// Only a failure to persist the seen-set at the end is an error.
    pub async fn run(&self, venues: &[VenueConfig], store: &mut SeenStore) -> Result<ScanReport> {
        let shard = shard_venues(
            venues,
            self.settings.shard_index,
            self.settings.shard_total,
            self.settings.max_venues_per_run,
        );

        let mut run = RunState {
            budget: RunBudget::from_config(&self.settings),
            cache: LookupCache::new(),
            report: ScanReport::default(),
            first_run: store.is_empty(),
            common: self
                .settings
                .common_tickers
                .iter()
                .map(|t| normalize_ticker(t))
                .collect(),
        };

        info!(
            shard_index = self.settings.shard_index,
            shard_total = self.settings.shard_total,
            venues = shard.len(),
            known_keys = store.len(),
            first_run = run.first_run,
            "Starting scan"
        );

        for venue in shard {
            if let Some(stop) = run.budget.run_stop() {
                info!(reason = %stop, elapsed_secs = run.budget.elapsed().as_secs(), "Stopping scan");
                run.report.stopped_by = Some(stop);
                break;
            }

            let venue_started = Instant::now();
            run.report.venues_visited += 1;

            let listing = match self.source.load_currencies(venue).await {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(venue = %venue.id, error = %e, "Venue failed, skipping");
                    run.report.venues_failed += 1;
                    continue;
                }
            };
            debug!(venue = %venue.id, currencies = listing.len(), "Loaded currencies");

            let keys_before = run.report.new_keys;
            let stop = match run.budget.check(venue_started) {
                Some(stop) => Some(stop),
                None => self.scan_venue(venue, listing, venue_started, store, &mut run).await,
            };

            if self.checkpoint_each_venue && run.report.new_keys > keys_before {
                if let Err(e) = store.save() {
                    warn!(venue = %venue.id, error = %e, "Checkpoint save failed");
                }
            }

            match stop {
                Some(BudgetStop::VenueTime) => {
                    info!(venue = %venue.id, "Venue time budget reached, moving on");
                    run.report.venues_truncated += 1;
                }
                Some(stop) => {
                    info!(reason = %stop, elapsed_secs = run.budget.elapsed().as_secs(), "Stopping scan");
                    run.report.stopped_by = Some(stop);
                    break;
                }
                None => {}
            }

            pause(self.settings.venue_pause_ms).await;
        }

        if store.is_dirty() {
            store.save()?;
        }

        let cache = run.cache.stats();
        info!(
            visited = run.report.venues_visited,
            failed = run.report.venues_failed,
            new_keys = run.report.new_keys,
            notified = run.report.notified,
            suppressed = run.report.suppressed_no_signal,
            cache_entries = cache.entries,
            cache_hits = cache.hits,
            elapsed_secs = run.budget.elapsed().as_secs(),
            "Scan complete"
        );

        Ok(run.report)
    }

    /// Process one venue's tickers; returns the budget that cut it short
    async fn scan_venue(
        &self,
        venue: &VenueConfig,
        listing: CurrencyListing,
        venue_started: Instant,
        store: &mut SeenStore,
        run: &mut RunState,
    ) -> Option<BudgetStop> {
        for (code, meta) in listing {
            if let Some(stop) = run.budget.check(venue_started) {
                return Some(stop);
            }

            let Some(key) = ListingKey::new(&venue.id, &code) else {
                continue;
            };
            if store.contains(&key) {
                continue;
            }

            let ticker = normalize_ticker(&code);
            if run.first_run && self.settings.skip_common_on_first_run && run.common.contains(&ticker) {
                debug!(venue = %venue.id, ticker = %ticker, "Skipping common ticker on first run");
                run.report.skipped_common += 1;
                continue;
            }

            // Recorded before resolving so a crash or retry never notifies twice
            let found_at = now_stamp();
            store.insert(&key, &found_at);
            run.report.new_keys += 1;

            let resolution = self.resolver.resolve(&ticker, &meta, &mut run.cache).await;
            if !resolution.is_informative() {
                info!(key = %key, "New listing without contract or pair, not notifying");
                run.report.suppressed_no_signal += 1;
                continue;
            }

            info!(
                key = %key,
                contract = resolution.contract.as_deref().unwrap_or("-"),
                chain = resolution.chain.as_deref().unwrap_or("-"),
                stage = ?resolution.stage,
                "New listing"
            );

            let alert = ListingAlert {
                venue: &venue.id,
                ticker: &ticker,
                found_at: &found_at,
                resolution: &resolution,
                venue_url: venue.www_url.as_deref(),
            };
            let message = NotificationMessage {
                text: alert.render(self.parse_mode),
                mode: self.parse_mode,
                destinations: self.destinations.clone(),
            };
            self.notifier.deliver(&message).await;
            run.budget.record_notification();
            run.report.notified += 1;

            pause(self.settings.notify_pause_ms).await;
        }
        None
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::notify::limiter::RateLimiter;
    use crate::notify::notifier::RetryPolicy;
    use crate::notify::telegram::{NotifyTransport, SendOutcome};
    use crate::resolve::metadata::CurrencyMeta;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    const CONTRACT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

    /// Serves fixed listings; unknown venues fail
    #[derive(Default)]
    struct FakeSource {
        listings: HashMap<String, Vec<(String, serde_json::Value)>>,
    }

    impl FakeSource {
        fn venue(mut self, id: &str, tickers: &[(&str, serde_json::Value)]) -> Self {
            self.listings.insert(
                id.to_string(),
                tickers.iter().map(|(t, m)| (t.to_string(), m.clone())).collect(),
            );
            self
        }
    }

    #[async_trait]
    impl VenueSource for FakeSource {
        async fn load_currencies(&self, venue: &VenueConfig) -> Result<CurrencyListing> {
            self.listings
                .get(&venue.id)
                .map(|items| {
                    items
                        .iter()
                        .map(|(t, m)| (t.clone(), CurrencyMeta::new(m.clone())))
                        .collect()
                })
                .ok_or_else(|| Error::venue(&venue.id, "connection refused"))
        }
    }

    /// Records sends, optionally taking `delay` per send
    #[derive(Default)]
    struct RecordingTransport {
        delay: Duration,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingTransport {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotifyTransport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, _destination: &str, text: &str, _mode: ParseMode) -> SendOutcome {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.sent.lock().unwrap().push(text.to_string());
            SendOutcome::Sent
        }
    }

    /// Every send fails transiently
    #[derive(Default)]
    struct FailingTransport {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl NotifyTransport for FailingTransport {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn send(&self, _destination: &str, _text: &str, _mode: ParseMode) -> SendOutcome {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            SendOutcome::Transient("connection reset".into())
        }
    }

    fn with_contract() -> serde_json::Value {
        json!({"info": {"contractAddress": CONTRACT}})
    }

    fn venue_config(id: &str) -> VenueConfig {
        VenueConfig {
            id: id.to_string(),
            currencies_url: format!("https://{}.example/currencies", id),
            www_url: None,
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.notifier.chat_ids = vec!["chat".into()];
        config.notifier.parse_mode = ParseMode::Plain;
        config.scan.notify_pause_ms = 0;
        config
    }

    fn orchestrator(config: &Config, source: FakeSource, transport: Arc<dyn NotifyTransport>) -> Orchestrator {
        let notifier = Notifier::new(
            transport,
            Arc::new(RateLimiter::new(Duration::ZERO, Duration::ZERO)),
            RetryPolicy::from_config(&config.notifier),
        );
        Orchestrator::new(config, Arc::new(source), IdentityResolver::default(), notifier)
    }

    fn key(venue: &str, ticker: &str) -> ListingKey {
        ListingKey::new(venue, ticker).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_listing_notified_once_across_runs() {
        let config = config();
        let transport = Arc::new(RecordingTransport::default());
        let source = FakeSource::default().venue("binance", &[("XYZ", with_contract())]);
        let orchestrator = orchestrator(&config, source, transport.clone());
        let venues = vec![venue_config("binance")];
        let mut store = SeenStore::in_memory();

        let first = orchestrator.run(&venues, &mut store).await.unwrap();
        assert_eq!(first.new_keys, 1);
        assert_eq!(first.notified, 1);
        assert!(store.contains(&key("BINANCE", "XYZ")));
        assert_eq!(transport.sent().len(), 1);
        assert!(transport.sent()[0].contains(CONTRACT));

        let second = orchestrator.run(&venues, &mut store).await.unwrap();
        assert_eq!(second.new_keys, 0);
        assert_eq!(second.notified, 0);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delivery_still_marks_seen() {
        let config = config();
        let transport = Arc::new(FailingTransport::default());
        let source = FakeSource::default().venue("binance", &[("XYZ", with_contract())]);
        let orchestrator = orchestrator(&config, source, transport.clone());
        let venues = vec![venue_config("binance")];
        let mut store = SeenStore::in_memory();

        let first = orchestrator.run(&venues, &mut store).await;
        assert!(first.is_ok());
        assert!(store.contains(&key("binance", "XYZ")));
        let attempts = transport.attempts.load(Ordering::SeqCst);
        assert_eq!(attempts, config.notifier.max_attempts);

        let second = orchestrator.run(&venues, &mut store).await.unwrap();
        assert_eq!(second.new_keys, 0);
        assert_eq!(second.notified, 0);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), attempts);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_carries_venue_link() {
        let config = config();
        let transport = Arc::new(RecordingTransport::default());
        let source = FakeSource::default().venue("kucoin", &[("NEW", with_contract())]);
        let orchestrator = orchestrator(&config, source, transport.clone());
        let mut venue = venue_config("kucoin");
        venue.www_url = Some("https://www.kucoin.com".into());
        let mut store = SeenStore::in_memory();

        orchestrator.run(&[venue], &mut store).await.unwrap();
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].ends_with("Link: https://www.kucoin.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_common_tickers_skipped_on_first_run_only() {
        let config = config();
        let transport = Arc::new(RecordingTransport::default());
        let source = FakeSource::default().venue(
            "kraken",
            &[("usdt", with_contract()), ("NEW", with_contract())],
        );
        let orchestrator = orchestrator(&config, source, transport.clone());
        let venues = vec![venue_config("kraken")];
        let mut store = SeenStore::in_memory();

        let first = orchestrator.run(&venues, &mut store).await.unwrap();
        assert_eq!(first.skipped_common, 1);
        assert_eq!(first.notified, 1);
        assert!(!store.contains(&key("kraken", "USDT")));

        // The store is no longer empty, so USDT is evaluated normally
        let second = orchestrator.run(&venues, &mut store).await.unwrap();
        assert_eq!(second.skipped_common, 0);
        assert_eq!(second.notified, 1);
        assert!(store.contains(&key("kraken", "USDT")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_without_signal_is_seen_but_silent() {
        let config = config();
        let transport = Arc::new(RecordingTransport::default());
        let source = FakeSource::default().venue("okx", &[("QUIET", json!({"info": {"name": "quiet"}}))]);
        let orchestrator = orchestrator(&config, source, transport.clone());
        let mut store = SeenStore::in_memory();

        let report = orchestrator.run(&[venue_config("okx")], &mut store).await.unwrap();
        assert_eq!(report.new_keys, 1);
        assert_eq!(report.suppressed_no_signal, 1);
        assert_eq!(report.notified, 0);
        assert!(store.contains(&key("okx", "QUIET")));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_venue_does_not_stop_run() {
        let config = config();
        let transport = Arc::new(RecordingTransport::default());
        let source = FakeSource::default().venue("good", &[("ABC", with_contract())]);
        let orchestrator = orchestrator(&config, source, transport.clone());
        let venues = vec![venue_config("broken"), venue_config("good")];
        let mut store = SeenStore::in_memory();

        let report = orchestrator.run(&venues, &mut store).await.unwrap();
        assert_eq!(report.venues_visited, 2);
        assert_eq!(report.venues_failed, 1);
        assert_eq!(report.notified, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_budget_bounds_slow_venue() {
        let mut config = config();
        config.scan.max_run_secs = 1;
        config.scan.max_venue_secs = 0;
        let transport = Arc::new(RecordingTransport {
            delay: Duration::from_secs(1),
            ..Default::default()
        });
        let tickers: Vec<(String, serde_json::Value)> =
            (0..10).map(|i| (format!("T{}", i), with_contract())).collect();
        let tickers: Vec<(&str, serde_json::Value)> =
            tickers.iter().map(|(t, m)| (t.as_str(), m.clone())).collect();
        let source = FakeSource::default().venue("slow", &tickers);
        let orchestrator = orchestrator(&config, source, transport.clone());
        let mut store = SeenStore::in_memory();

        let started = Instant::now();
        let report = orchestrator.run(&[venue_config("slow")], &mut store).await.unwrap();

        assert!(started.elapsed() <= Duration::from_millis(2500), "took {:?}", started.elapsed());
        assert!(report.notified < 10);
        assert_eq!(report.stopped_by, Some(BudgetStop::RunTime));
    }

    #[tokio::test(start_paused = true)]
    async fn test_venue_budget_moves_to_next_venue() {
        let mut config = config();
        config.scan.max_venue_secs = 2;
        let transport = Arc::new(RecordingTransport {
            delay: Duration::from_secs(1),
            ..Default::default()
        });
        let slow: Vec<(String, serde_json::Value)> =
            (0..10).map(|i| (format!("S{}", i), with_contract())).collect();
        let slow: Vec<(&str, serde_json::Value)> = slow.iter().map(|(t, m)| (t.as_str(), m.clone())).collect();
        let source = FakeSource::default()
            .venue("slow", &slow)
            .venue("fast", &[("F1", with_contract())]);
        let orchestrator = orchestrator(&config, source, transport.clone());
        let mut store = SeenStore::in_memory();

        let report = orchestrator
            .run(&[venue_config("slow"), venue_config("fast")], &mut store)
            .await
            .unwrap();

        assert_eq!(report.venues_truncated, 1);
        assert_eq!(report.stopped_by, None);
        assert!(store.contains(&key("fast", "F1")));
        assert!(report.notified < 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_budget_stops_run() {
        let mut config = config();
        config.scan.max_notifications_per_run = 2;
        let transport = Arc::new(RecordingTransport::default());
        let source = FakeSource::default().venue(
            "gate",
            &[
                ("A", with_contract()),
                ("B", with_contract()),
                ("C", with_contract()),
                ("D", with_contract()),
            ],
        );
        let orchestrator = orchestrator(&config, source, transport.clone());
        let mut store = SeenStore::in_memory();

        let report = orchestrator.run(&[venue_config("gate")], &mut store).await.unwrap();
        assert_eq!(report.notified, 2);
        assert_eq!(report.new_keys, 2);
        assert_eq!(report.stopped_by, Some(BudgetStop::Notifications));
        // Unprocessed tickers stay unseen for the next run
        assert!(!store.contains(&key("gate", "C")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_this_shards_venues_are_scanned() {
        let mut config = config();
        config.scan.shard_index = 1;
        config.scan.shard_total = 2;
        let transport = Arc::new(RecordingTransport::default());
        let source = FakeSource::default()
            .venue("v0", &[("A", with_contract())])
            .venue("v1", &[("B", with_contract())]);
        let orchestrator = orchestrator(&config, source, transport.clone());
        let mut store = SeenStore::in_memory();

        let report = orchestrator
            .run(&[venue_config("v0"), venue_config("v1")], &mut store)
            .await
            .unwrap();
        assert_eq!(report.venues_visited, 1);
        assert!(store.contains(&key("v1", "B")));
        assert!(!store.contains(&key("v0", "A")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_persisted_at_end_of_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let mut config = config();
        config.state.checkpoint_each_venue = true;
        let transport = Arc::new(RecordingTransport::default());
        let source = FakeSource::default().venue("mexc", &[("ZZZ", with_contract())]);
        let orchestrator = orchestrator(&config, source, transport);

        let mut store = SeenStore::load(&path).unwrap();
        orchestrator.run(&[venue_config("mexc")], &mut store).await.unwrap();

        let reloaded = SeenStore::load(&path).unwrap();
        assert!(reloaded.contains(&key("MEXC", "ZZZ")));
    }
}
