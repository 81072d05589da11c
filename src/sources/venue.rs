//! Venue currency catalogs
//!
//! A venue exposes its tradable currencies as ticker → metadata. The scan
//! only needs that listing, so the source is a trait and the HTTP
//! implementation accepts the two payload shapes venues commonly return.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::VenueConfig;
use crate::error::{Error, Result};
use crate::resolve::metadata::CurrencyMeta;
use crate::sources::USER_AGENT;

/// Currency listing in the order the venue returned it
pub type CurrencyListing = Vec<(String, CurrencyMeta)>;

/// Anything that can list a venue's currencies
#[async_trait]
pub trait VenueSource: Send + Sync {
    async fn load_currencies(&self, venue: &VenueConfig) -> Result<CurrencyListing>;
}

/// Fetches `currencies_url` for each venue over HTTP
pub struct HttpVenueSource {
    client: reqwest::Client,
}

impl HttpVenueSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl VenueSource for HttpVenueSource {
    async fn load_currencies(&self, venue: &VenueConfig) -> Result<CurrencyListing> {
        debug!(venue = %venue.id, url = %venue.currencies_url, "Loading currencies");

        let resp = self
            .client
            .get(&venue.currencies_url)
            .send()
            .await
            .map_err(|e| Error::venue(&venue.id, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::venue(
                &venue.id,
                Error::HttpStatus {
                    status: status.as_u16(),
                    body,
                },
            ));
        }

        let payload: Value = resp.json().await.map_err(|e| Error::venue(&venue.id, e))?;
        parse_listing(payload).ok_or_else(|| Error::venue(&venue.id, "unrecognized currency payload"))
    }
}

/// Turn a catalog payload into an ordered listing.
///
/// Accepts `{"BTC": {...}, ...}` or `[{"code": "BTC", ...}, ...]` (also
/// `currency`, `id` or `symbol` as the ticker field). An array wrapped in a
/// `data` envelope is unwrapped first. Array entries without a ticker are
/// dropped. Entries that are not already `{"info": ..., "networks": ...}`
/// documents are wrapped as `{"info": entry}`. Returns `None` for anything
/// else.
pub fn parse_listing(payload: Value) -> Option<CurrencyListing> {
    match payload {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_array) => {
            parse_listing(map.remove("data")?)
        }
        Value::Object(map) => Some(
            map.into_iter()
                .map(|(code, meta)| (code, as_currency_meta(meta)))
                .collect(),
        ),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| {
                    let code = ["code", "currency", "id", "symbol"]
                        .iter()
                        .find_map(|k| item.get(*k).and_then(Value::as_str))
                        .filter(|c| !c.is_empty())?
                        .to_string();
                    Some((code, as_currency_meta(item)))
                })
                .collect(),
        ),
        _ => None,
    }
}

fn as_currency_meta(entry: Value) -> CurrencyMeta {
    let shaped = entry
        .as_object()
        .is_some_and(|m| m.contains_key("info") || m.contains_key("networks"));
    if shaped {
        CurrencyMeta::new(entry)
    } else {
        CurrencyMeta::new(json!({ "info": entry }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{IdentityResolver, LookupCache};

    #[test]
    fn test_parse_object_listing_keeps_order() {
        let listing = parse_listing(json!({
            "ZED": {"info": {}},
            "ABC": {"info": {"address": "0x1"}},
            "MID": null
        }))
        .unwrap();
        let codes: Vec<&str> = listing.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(codes, vec!["ZED", "ABC", "MID"]);
        assert_eq!(listing[1].1.top_level_contract().as_deref(), Some("0x1"));
    }

    #[test]
    fn test_parse_array_listing() {
        let listing = parse_listing(json!([
            {"currency": "abc", "info": {"contract": "C1"}},
            {"name": "no ticker"},
            {"code": ""},
            {"symbol": "XYZ"}
        ]))
        .unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].0, "abc");
        assert_eq!(listing[1].0, "XYZ");
    }

    #[test]
    fn test_parse_data_envelope() {
        let listing = parse_listing(json!({
            "code": "200000",
            "data": [{"currency": "NEW"}, {"currency": "OLD"}]
        }))
        .unwrap();
        let codes: Vec<&str> = listing.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(codes, vec!["NEW", "OLD"]);
    }

    #[test]
    fn test_flat_entries_wrapped_as_info() {
        let listing = parse_listing(json!({
            "data": [{"currency": "NEW", "contractAddress": "0xabc"}]
        }))
        .unwrap();
        assert_eq!(listing[0].1.top_level_contract().as_deref(), Some("0xabc"));

        let listing = parse_listing(json!({"RAW": {"address": "0xdef"}})).unwrap();
        assert_eq!(listing[0].1.top_level_contract().as_deref(), Some("0xdef"));
    }

    #[tokio::test]
    async fn test_array_listing_resolves_contract() {
        let evm = "0x1111111111111111111111111111111111111111";
        let listing = parse_listing(json!([{"currency": "ABC", "contractAddress": evm}])).unwrap();
        let (ticker, meta) = &listing[0];

        let result = IdentityResolver::new(None, None)
            .resolve(ticker, meta, &mut LookupCache::new())
            .await;
        assert_eq!(result.contract.as_deref(), Some(evm));
    }

    #[test]
    fn test_http_source_builds() {
        assert!(HttpVenueSource::new(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_parse_rejects_scalars() {
        assert!(parse_listing(json!("nope")).is_none());
        assert!(parse_listing(json!(null)).is_none());
    }
}
