//! Token identity resolution
//!
//! Given a ticker and the venue's metadata for it, find the contract
//! address, its chain, a catalog id and a reference URL. Stages run in a
//! fixed priority order and the first one that yields a contract wins:
//!
//! 1. known contract fields in the venue metadata
//! 2. address-shaped strings anywhere in the venue `info` blob
//! 3. market-data catalog (search by symbol, then platform contracts)
//! 4. pair search (may produce only a reference URL)
//!
//! Stages 3 and 4 never fail the pipeline; an unusable outcome just moves
//! on to the next stage.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::resolve::cache::LookupCache;
use crate::resolve::extract::{extract_contracts, guess_chain, pick_best_contract};
use crate::resolve::lookup::{CatalogLookup, Lookup, PairSearch};
use crate::resolve::metadata::CurrencyMeta;
use crate::sources::coingecko::MarketStats;

/// Best-effort identity of a listed token
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionResult {
    pub contract: Option<String>,
    pub chain: Option<String>,
    /// Market-data catalog id
    pub external_id: Option<String>,
    /// Human-viewable pair page
    pub reference_url: Option<String>,
    pub market: Option<MarketStats>,
    /// Stage that produced the contract or URL
    #[serde(skip)]
    pub stage: Option<Stage>,
}

impl ResolutionResult {
    /// Worth notifying about: has a contract or at least a reference URL
    pub fn is_informative(&self) -> bool {
        self.contract.is_some() || self.reference_url.is_some()
    }
}

/// Pipeline stages in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    VenueMetadata,
    RawText,
    Catalog,
    PairSearch,
}

/// What the catalog stage learned, even without a contract
#[derive(Debug, Default)]
struct CatalogFindings {
    external_id: Option<String>,
    market: Option<MarketStats>,
    contract: Option<(String, Option<String>)>,
}

/// Trim and uppercase a ticker
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// Runs the four-stage resolution pipeline
#[derive(Default, Clone)]
pub struct IdentityResolver {
    catalog: Option<Arc<dyn CatalogLookup>>,
    pairs: Option<Arc<dyn PairSearch>>,
}

impl IdentityResolver {
    pub fn new(
        catalog: Option<Arc<dyn CatalogLookup>>,
        pairs: Option<Arc<dyn PairSearch>>,
    ) -> Self {
        Self { catalog, pairs }
    }

    /// Resolve a ticker. Never fails; unknown tokens give an empty result.
    pub async fn resolve(
        &self,
        ticker: &str,
        meta: &CurrencyMeta,
        cache: &mut LookupCache,
    ) -> ResolutionResult {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return ResolutionResult::default();
        }

        if let Some(result) = venue_metadata_stage(meta) {
            debug!(ticker = %ticker, "Contract from venue metadata");
            return result;
        }

        if let Some(result) = raw_text_stage(meta) {
            debug!(ticker = %ticker, "Contract from raw venue info");
            return result;
        }

        let findings = self.catalog_stage(&ticker, cache).await;
        if let Some((contract, chain)) = findings.contract {
            debug!(ticker = %ticker, chain = ?chain, "Contract from catalog");
            return ResolutionResult {
                contract: Some(contract),
                chain,
                external_id: findings.external_id,
                reference_url: None,
                market: findings.market,
                stage: Some(Stage::Catalog),
            };
        }

        let mut result = self.pair_stage(&ticker, cache).await.unwrap_or_default();
        result.external_id = findings.external_id;
        result.market = findings.market;
        result
    }

    async fn catalog_stage(&self, ticker: &str, cache: &mut LookupCache) -> CatalogFindings {
        let mut findings = CatalogFindings::default();
        let Some(catalog) = &self.catalog else {
            return findings;
        };

        let hit = match cache.search(ticker) {
            Some(outcome) => outcome,
            None => {
                let outcome = catalog.search(ticker).await;
                cache.store_search(ticker, outcome.clone());
                outcome
            }
        };

        let id = match hit {
            Lookup::Found(hit) if !hit.id.is_empty() => hit.id,
            Lookup::Failed(e) => {
                debug!(ticker = %ticker, provider = catalog.name(), error = %e, "Catalog search failed");
                return findings;
            }
            _ => return findings,
        };
        findings.external_id = Some(id.clone());

        let detail = match cache.detail(&id) {
            Some(outcome) => outcome,
            None => {
                let outcome = catalog.coin_detail(&id).await;
                cache.store_detail(&id, outcome.clone());
                outcome
            }
        };

        let detail = match detail {
            Lookup::Found(detail) => detail,
            Lookup::Failed(e) => {
                debug!(ticker = %ticker, id = %id, error = %e, "Catalog detail failed");
                return findings;
            }
            Lookup::Empty => return findings,
        };

        if !detail.market.is_empty() {
            findings.market = Some(detail.market);
        }

        findings.contract = detail
            .platforms
            .into_iter()
            .find(|(_, addr)| !addr.is_empty())
            .map(|(chain, addr)| {
                let chain = (!chain.is_empty()).then(|| chain.to_uppercase());
                (addr, chain)
            });

        findings
    }

    async fn pair_stage(&self, ticker: &str, cache: &mut LookupCache) -> Option<ResolutionResult> {
        let pairs = self.pairs.as_ref()?;

        let outcome = match cache.pair(ticker) {
            Some(outcome) => outcome,
            None => {
                let outcome = pairs.search_pairs(ticker).await;
                cache.store_pair(ticker, outcome.clone());
                outcome
            }
        };

        let pair = match outcome {
            Lookup::Found(pair) => pair,
            Lookup::Failed(e) => {
                debug!(ticker = %ticker, provider = pairs.name(), error = %e, "Pair search failed");
                return None;
            }
            Lookup::Empty => return None,
        };

        let url = pair.pair_url().map(str::to_string);
        if let Some(contract) = pair.contract() {
            debug!(ticker = %ticker, "Contract from pair search");
            return Some(ResolutionResult {
                contract: Some(contract.to_string()),
                chain: pair.chain_or_guess(),
                reference_url: url,
                stage: Some(Stage::PairSearch),
                ..Default::default()
            });
        }

        url.map(|url| ResolutionResult {
            chain: pair.chain(),
            reference_url: Some(url),
            stage: Some(Stage::PairSearch),
            ..Default::default()
        })
    }
}

/// A top-level `info` contract wins outright; network entries go through
/// the picker
fn venue_metadata_stage(meta: &CurrencyMeta) -> Option<ResolutionResult> {
    let contract = meta
        .top_level_contract()
        .or_else(|| pick_best_contract(&meta.network_contracts()))?;
    Some(shape_only(contract, Stage::VenueMetadata))
}

fn raw_text_stage(meta: &CurrencyMeta) -> Option<ResolutionResult> {
    let contract = pick_best_contract(&extract_contracts(&meta.info_text()))?;
    Some(shape_only(contract, Stage::RawText))
}

fn shape_only(contract: String, stage: Stage) -> ResolutionResult {
    ResolutionResult {
        chain: guess_chain(Some(contract.as_str())),
        contract: Some(contract),
        stage: Some(stage),
        ..Default::default()
    }
}
