//! External data sources: venue catalogs and enrichment APIs

pub mod coingecko;
pub mod dexscreener;
pub mod venue;

pub use coingecko::{CoinDetail, CoinGeckoClient, CoinHit, MarketStats};
pub use dexscreener::{DexPair, DexScreenerClient};
pub use venue::{CurrencyListing, HttpVenueSource, VenueSource};

/// User agent sent to every external service
pub const USER_AGENT: &str = "cex-listing-bot";
