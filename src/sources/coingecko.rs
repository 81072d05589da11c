// CoinGecko API client for symbol search and platform contracts
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::CoinGeckoConfig;
use crate::resolve::lookup::{
    classify_status, transport_error, CatalogLookup, Lookup, LookupError, LOOKUP_TIMEOUT,
};
use crate::sources::USER_AGENT;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinHit {
    #[serde(default)]
    pub id: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub market_cap_rank: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    coins: Option<Vec<CoinHit>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MarketData {
    market_cap: Option<HashMap<String, Option<f64>>>,
    total_volume: Option<HashMap<String, Option<f64>>>,
}

#[derive(Debug, Clone, Deserialize)]
struct CoinResponse {
    platforms: Option<Map<String, Value>>,
    market_data: Option<MarketData>,
}

/// USD market figures reported by the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub market_cap_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
}

impl MarketStats {
    pub fn is_empty(&self) -> bool {
        self.market_cap_usd.is_none() && self.volume_24h_usd.is_none()
    }
}

/// Catalog entry for one coin
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoinDetail {
    /// (platform name, contract address) in catalog order
    pub platforms: Vec<(String, String)>,
    pub market: MarketStats,
}

impl From<CoinResponse> for CoinDetail {
    fn from(resp: CoinResponse) -> Self {
        let platforms = resp
            .platforms
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(chain, addr)| match addr {
                Value::String(s) => Some((chain, s)),
                _ => None,
            })
            .collect();

        let md = resp.market_data.unwrap_or_default();
        let usd = |m: Option<HashMap<String, Option<f64>>>| {
            m.and_then(|m| m.get("usd").copied().flatten())
        };

        Self {
            platforms,
            market: MarketStats {
                market_cap_usd: usd(md.market_cap),
                volume_24h_usd: usd(md.total_volume),
            },
        }
    }
}

pub struct CoinGeckoClient {
    client: reqwest::Client,
    base_url: String,
    polite_delay: Duration,
}

impl CoinGeckoClient {
    pub fn new(config: &CoinGeckoConfig) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            polite_delay: Duration::from_millis(config.polite_delay_ms),
        })
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, LookupError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        if let Some(e) = classify_status(resp.status().as_u16()) {
            return Err(e);
        }

        resp.json::<T>().await.map_err(transport_error)
    }
}

#[async_trait]
impl CatalogLookup for CoinGeckoClient {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn search(&self, symbol: &str) -> Lookup<CoinHit> {
        let url = format!("{}/search", self.base_url);
        debug!(symbol = %symbol, "CoinGecko search");

        let result = self
            .get::<SearchResponse>(&url, &[("query", symbol)])
            .await
            .map(|data| data.coins.and_then(|coins| coins.into_iter().next()));

        Lookup::from_result(result)
    }

    async fn coin_detail(&self, id: &str) -> Lookup<CoinDetail> {
        let url = format!("{}/coins/{}", self.base_url, id);
        debug!(id = %id, "CoinGecko coin detail");

        let result = self
            .get::<CoinResponse>(
                &url,
                &[
                    ("localization", "false"),
                    ("tickers", "false"),
                    ("market_data", "true"),
                    ("community_data", "false"),
                    ("developer_data", "false"),
                    ("sparkline", "false"),
                ],
            )
            .await;

        match result {
            Ok(resp) => {
                // Public tier throttles hard; space out consecutive detail calls
                tokio::time::sleep(self.polite_delay).await;
                Lookup::Found(CoinDetail::from(resp))
            }
            Err(e) => Lookup::Failed(e),
        }
    }
}
