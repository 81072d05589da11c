//! Token identity resolution
//!
//! Pattern extraction, the loosely-typed metadata wrapper, lookup seams,
//! the per-run cache and the staged resolver itself.

pub mod cache;
pub mod extract;
pub mod lookup;
pub mod metadata;
pub mod pipeline;

pub use cache::{CacheStats, LookupCache};
pub use extract::{extract_contracts, extract_ticker, guess_chain, pick_best_contract, summarize};
pub use lookup::{CatalogLookup, Lookup, LookupError, PairSearch};
pub use metadata::CurrencyMeta;
pub use pipeline::{normalize_ticker, IdentityResolver, ResolutionResult, Stage};
