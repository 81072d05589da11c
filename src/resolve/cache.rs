//! Per-run cache for external lookups
//!
//! Owned by the scan for one run and handed to the resolver by `&mut`.
//! Failed outcomes are cached as well: a rate-limited catalog is not asked
//! again for the same ticker in the same run.

use std::collections::HashMap;

use crate::resolve::lookup::Lookup;
use crate::sources::coingecko::{CoinDetail, CoinHit};
use crate::sources::dexscreener::DexPair;

#[derive(Debug, Default)]
pub struct LookupCache {
    /// Normalized ticker → catalog search outcome
    search: HashMap<String, Lookup<CoinHit>>,
    /// Catalog id → detail outcome
    detail: HashMap<String, Lookup<CoinDetail>>,
    /// Normalized ticker → pair search outcome
    pairs: HashMap<String, Lookup<DexPair>>,
    hits: u64,
    misses: u64,
}

/// Cache counters for end-of-run logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(&mut self, ticker: &str) -> Option<Lookup<CoinHit>> {
        let cached = self.search.get(ticker).cloned();
        self.count(cached.is_some());
        cached
    }

    pub fn store_search(&mut self, ticker: &str, outcome: Lookup<CoinHit>) {
        self.search.insert(ticker.to_string(), outcome);
    }

    pub fn detail(&mut self, id: &str) -> Option<Lookup<CoinDetail>> {
        let cached = self.detail.get(id).cloned();
        self.count(cached.is_some());
        cached
    }

    pub fn store_detail(&mut self, id: &str, outcome: Lookup<CoinDetail>) {
        self.detail.insert(id.to_string(), outcome);
    }

    pub fn pair(&mut self, ticker: &str) -> Option<Lookup<DexPair>> {
        let cached = self.pairs.get(ticker).cloned();
        self.count(cached.is_some());
        cached
    }

    pub fn store_pair(&mut self, ticker: &str, outcome: Lookup<DexPair>) {
        self.pairs.insert(ticker.to_string(), outcome);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.search.len() + self.detail.len() + self.pairs.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }

    fn count(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }
}
