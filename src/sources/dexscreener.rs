// DexScreener API client for pair search by symbol
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DexScreenerConfig;
use crate::resolve::extract::guess_chain;
use crate::resolve::lookup::{
    classify_status, transport_error, Lookup, LookupError, PairSearch, LOOKUP_TIMEOUT,
};
use crate::sources::USER_AGENT;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseToken {
    pub address: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DexPair {
    #[serde(rename = "chainId", alias = "chain_id")]
    pub chain_id: Option<String>,
    #[serde(rename = "dexId")]
    pub dex_id: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "pairAddress")]
    pub pair_address: Option<String>,
    #[serde(rename = "baseToken")]
    pub base_token: Option<BaseToken>,
    #[serde(rename = "priceUsd")]
    pub price_usd: Option<String>,
}

impl DexPair {
    /// Base token contract, if the pair carries one
    pub fn contract(&self) -> Option<&str> {
        self.base_token
            .as_ref()
            .and_then(|b| b.address.as_deref())
            .filter(|a| !a.is_empty())
    }

    /// Human-viewable pair page
    pub fn pair_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    /// Chain reported by the pair, uppercased
    pub fn chain(&self) -> Option<String> {
        self.chain_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
    }

    /// Reported chain, else a shape guess on the contract
    pub fn chain_or_guess(&self) -> Option<String> {
        self.chain().or_else(|| guess_chain(self.contract()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSearchResponse {
    pub pairs: Option<Vec<DexPair>>,
}

pub struct DexScreenerClient {
    client: reqwest::Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(config: &DexScreenerConfig) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_first_pair(&self, symbol: &str) -> Result<Option<DexPair>, LookupError> {
        let url = format!("{}/latest/dex/search", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("q", symbol)])
            .send()
            .await
            .map_err(transport_error)?;

        if let Some(e) = classify_status(resp.status().as_u16()) {
            return Err(e);
        }

        let data: PairSearchResponse = resp.json().await.map_err(transport_error)?;
        Ok(data.pairs.and_then(|pairs| pairs.into_iter().next()))
    }
}

#[async_trait]
impl PairSearch for DexScreenerClient {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn search_pairs(&self, symbol: &str) -> Lookup<DexPair> {
        let q = symbol.trim();
        if q.is_empty() {
            return Lookup::Empty;
        }
        debug!(symbol = %q, "DexScreener pair search");
        Lookup::from_result(self.fetch_first_pair(q).await)
    }
}
