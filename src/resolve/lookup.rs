//! Seams to the external lookup services used by the resolver
//!
//! Every call reports an explicit tagged outcome instead of an error, so the
//! pipeline's "try the next stage" decision is a plain match.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::sources::coingecko::{CoinDetail, CoinHit};
use crate::sources::dexscreener::DexPair;

/// Why an external lookup produced nothing usable
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("rate limited")]
    RateLimited,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("transport: {0}")]
    Transport(String),

    #[error("decode: {0}")]
    Decode(String),
}

/// Outcome of a single external lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// The service answered with a usable record
    Found(T),
    /// The service answered but had nothing for this query
    Empty,
    /// The call failed; callers treat this as "no signal"
    Failed(LookupError),
}

impl<T> Lookup<T> {
    /// Found when `Some`, Empty otherwise
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::Empty,
        }
    }

    /// Lift a fallible response into a tagged outcome
    pub fn from_result(result: std::result::Result<Option<T>, LookupError>) -> Self {
        match result {
            Ok(value) => Self::from_option(value),
            Err(e) => Lookup::Failed(e),
        }
    }
}

/// Market-data catalog searched by symbol (CoinGecko-shaped)
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Best match for a symbol
    async fn search(&self, symbol: &str) -> Lookup<CoinHit>;

    /// Platform contracts and market stats for a catalog id
    async fn coin_detail(&self, id: &str) -> Lookup<CoinDetail>;
}

/// Trading-pair search by symbol (DexScreener-shaped)
#[async_trait]
pub trait PairSearch: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Best pair for a symbol
    async fn search_pairs(&self, symbol: &str) -> Lookup<DexPair>;
}

/// Map an HTTP status to a lookup failure, `None` on success
pub fn classify_status(status: u16) -> Option<LookupError> {
    match status {
        429 => Some(LookupError::RateLimited),
        s if s >= 400 => Some(LookupError::Status(s)),
        _ => None,
    }
}

/// Convert a reqwest failure into a lookup failure
pub fn transport_error(e: reqwest::Error) -> LookupError {
    if e.is_decode() {
        LookupError::Decode(e.to_string())
    } else {
        LookupError::Transport(e.to_string())
    }
}

/// Default timeout applied by the lookup clients
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);
