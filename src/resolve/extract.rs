//! Address and ticker extraction from free-form text
//!
//! Pure pattern matching, no I/O. These helpers feed the resolver's
//! metadata and raw-text stages and decide which candidate wins.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Chain tag reported for shape-detected EVM addresses
pub const EVM_CHAIN: &str = "EVM";

static EVM_ADDRESS: OnceLock<Regex> = OnceLock::new();
static EVM_EXACT: OnceLock<Regex> = OnceLock::new();
static BASE58_ADDRESS: OnceLock<Regex> = OnceLock::new();
static TICKER_PARENS: OnceLock<Regex> = OnceLock::new();
static TICKER_USDT_PAIR: OnceLock<Regex> = OnceLock::new();

fn evm_address() -> &'static Regex {
    EVM_ADDRESS.get_or_init(|| {
        Regex::new(r"\b0x[a-fA-F0-9]{40}\b").expect("Invalid EVM address regex")
    })
}

fn evm_exact() -> &'static Regex {
    EVM_EXACT.get_or_init(|| {
        Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("Invalid EVM exact regex")
    })
}

fn base58_address() -> &'static Regex {
    BASE58_ADDRESS.get_or_init(|| {
        // Bitcoin alphabet: no 0, O, I, l
        Regex::new(r"\b[1-9A-HJ-NP-Za-km-z]{32,44}\b").expect("Invalid base58 address regex")
    })
}

fn ticker_parens() -> &'static Regex {
    TICKER_PARENS.get_or_init(|| {
        Regex::new(r"\(([A-Za-z0-9.\-]{1,15})\)").expect("Invalid ticker regex")
    })
}

fn ticker_usdt_pair() -> &'static Regex {
    TICKER_USDT_PAIR.get_or_init(|| {
        Regex::new(r"\b([A-Z0-9]{2,12})/USDT\b").expect("Invalid pair regex")
    })
}

/// True when `candidate` is exactly `0x` followed by 40 hex characters
pub fn is_evm_address(candidate: &str) -> bool {
    evm_exact().is_match(candidate)
}

/// Pull candidate contract addresses out of arbitrary text.
///
/// EVM addresses are always scanned. Base58 (Solana-style) strings are only
/// considered when the text mentions `solana` or `spl`, otherwise ordinary
/// long alphanumeric tokens would flood the result. Order of first
/// occurrence is kept (EVM matches first), duplicates are dropped.
pub fn extract_contracts(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut found: Vec<&str> = evm_address().find_iter(text).map(|m| m.as_str()).collect();

    let lower = text.to_lowercase();
    if lower.contains("solana") || lower.contains("spl") {
        found.extend(base58_address().find_iter(text).map(|m| m.as_str()));
    }

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter(|c| seen.insert(*c))
        .map(str::to_string)
        .collect()
}

/// Choose one address from an ordered candidate list.
///
/// The first EVM-shaped candidate wins regardless of position; failing that
/// the caller's ordering decides.
pub fn pick_best_contract<S: AsRef<str>>(candidates: &[S]) -> Option<String> {
    candidates
        .iter()
        .map(|c| c.as_ref())
        .find(|c| is_evm_address(c))
        .or_else(|| candidates.first().map(|c| c.as_ref()))
        .map(str::to_string)
}

/// Coarse chain family from address shape alone.
///
/// Only EVM is asserted. Base58 strings could belong to several chains, so
/// they yield `None` and a confident tag has to come from upstream metadata.
pub fn guess_chain(address: Option<&str>) -> Option<String> {
    let addr = address?.trim();
    is_evm_address(addr).then(|| EVM_CHAIN.to_string())
}

/// Ticker from an announcement-style title, e.g. `"Will list Foo (FOO)"`
/// or `"FOO/USDT trading opens"`.
pub fn extract_ticker(title: &str) -> Option<String> {
    if title.is_empty() {
        return None;
    }
    if let Some(caps) = ticker_parens().captures(title) {
        return Some(caps[1].to_uppercase());
    }
    ticker_usdt_pair()
        .captures(title)
        .map(|caps| caps[1].to_uppercase())
}

/// Ticker and best contract from an announcement title and body
pub fn summarize(title: &str, body: &str) -> (Option<String>, Option<String>) {
    let ticker = extract_ticker(title);
    let contracts = extract_contracts(&format!("{}\n{}", title, body));
    (ticker, pick_best_contract(&contracts))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVM_A: &str = "0x1111111254EEB25477B68fb85Ed929f73A960582";
    const EVM_B: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
    const SOL_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    #[test]
    fn test_extract_evm_order_and_dedup() {
        let text = format!("first {} then {} and again {}", EVM_B, EVM_A, EVM_B);
        assert_eq!(extract_contracts(&text), vec![EVM_B.to_string(), EVM_A.to_string()]);
    }

    #[test]
    fn test_extract_ignores_base58_without_hint() {
        let text = format!("token {} on mainnet {}", SOL_MINT, EVM_A);
        assert_eq!(extract_contracts(&text), vec![EVM_A.to_string()]);
    }

    #[test]
    fn test_extract_base58_with_hint() {
        let text = format!("Network: SOLANA mint {}", SOL_MINT);
        assert_eq!(extract_contracts(&text), vec![SOL_MINT.to_string()]);

        let text = format!("spl token {} / {}", SOL_MINT, EVM_A);
        // EVM matches come first
        assert_eq!(
            extract_contracts(&text),
            vec![EVM_A.to_string(), SOL_MINT.to_string()]
        );
    }

    #[test]
    fn test_extract_requires_word_boundary() {
        let glued = format!("x{}", EVM_A);
        assert!(extract_contracts(&glued).is_empty());
        let too_long = format!("{}ab", EVM_A);
        assert!(extract_contracts(&too_long).is_empty());
        assert!(extract_contracts("").is_empty());
    }

    #[test]
    fn test_pick_prefers_first_evm() {
        let cands = vec![SOL_MINT.to_string(), EVM_B.to_string(), EVM_A.to_string()];
        assert_eq!(pick_best_contract(&cands), Some(EVM_B.to_string()));
    }

    #[test]
    fn test_pick_falls_back_to_first() {
        assert_eq!(
            pick_best_contract(&["TRX-abc", SOL_MINT]),
            Some("TRX-abc".to_string())
        );
        let empty: [&str; 0] = [];
        assert_eq!(pick_best_contract(&empty), None);
    }

    #[test]
    fn test_pick_rejects_evm_lookalike() {
        // 0x prefix and 42 chars but not hex
        let fake = "0xZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZ";
        assert_eq!(pick_best_contract(&[fake, EVM_A]), Some(EVM_A.to_string()));
    }

    #[test]
    fn test_guess_chain_is_conservative() {
        assert_eq!(guess_chain(Some(EVM_A)), Some("EVM".to_string()));
        assert_eq!(guess_chain(Some(format!("  {} ", EVM_A).as_str())), Some("EVM".to_string()));
        assert_eq!(guess_chain(Some(SOL_MINT)), None);
        assert_eq!(guess_chain(Some("")), None);
        assert_eq!(guess_chain(None), None);
    }

    #[test]
    fn test_extract_ticker() {
        assert_eq!(
            extract_ticker("Binance Will List Foo Protocol (foo)"),
            Some("FOO".to_string())
        );
        assert_eq!(
            extract_ticker("New spot pair BAR/USDT opens today"),
            Some("BAR".to_string())
        );
        assert_eq!(extract_ticker("Maintenance notice"), None);
    }

    #[test]
    fn test_summarize() {
        let (ticker, contract) = summarize("Listing (ABC)", &format!("contract: {}", EVM_A));
        assert_eq!(ticker.as_deref(), Some("ABC"));
        assert_eq!(contract.as_deref(), Some(EVM_A));
    }
}
