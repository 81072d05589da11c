//! Loosely-typed venue currency metadata
//!
//! Venues publish whatever they like under `info` and `networks`. This
//! wrapper never assumes a field exists; every accessor returns an Option
//! or an empty iterator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names venues use for a token's contract address
pub const CONTRACT_KEYS: [&str; 5] = [
    "contractAddress",
    "contract_address",
    "tokenAddress",
    "address",
    "contract",
];

/// One currency entry from a venue catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyMeta(Value);

impl CurrencyMeta {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The venue's free-form `info` value, if any
    pub fn info_value(&self) -> Option<&Value> {
        self.0.get("info").filter(|v| !v.is_null())
    }

    /// `info` when it is an object
    pub fn info(&self) -> Option<&Map<String, Value>> {
        self.info_value().and_then(Value::as_object)
    }

    /// Per-network `info` objects in the order the venue listed them
    pub fn network_infos(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.0
            .get("networks")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|networks| networks.values())
            .filter_map(|net| net.get("info").and_then(Value::as_object))
    }

    /// First non-empty known contract key in the top-level `info`, taken
    /// verbatim whatever its shape
    pub fn top_level_contract(&self) -> Option<String> {
        self.info().and_then(first_contract)
    }

    /// Known contract values from each network's `info`, in network order
    pub fn network_contracts(&self) -> Vec<String> {
        self.network_infos().filter_map(first_contract).collect()
    }

    /// `info` flattened to a single string for raw scanning
    pub fn info_text(&self) -> String {
        match self.info_value() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

fn first_contract(info: &Map<String, Value>) -> Option<String> {
    CONTRACT_KEYS
        .iter()
        .filter_map(|key| info.get(*key).and_then(Value::as_str))
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

impl From<Value> for CurrencyMeta {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
