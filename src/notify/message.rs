//! Notification text
//!
//! Builds the listing alert in either plain text or Telegram MarkdownV2.

use serde::{Deserialize, Serialize};

use crate::resolve::pipeline::ResolutionResult;

/// Characters Telegram MarkdownV2 reserves outside code spans
const MARKDOWN_V2_RESERVED: &str = r"_*[]()~`>#+-=|{}.!";

/// How the endpoint should interpret the text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    Plain,
    #[default]
    MarkdownV2,
}

impl ParseMode {
    /// Value for the Bot API `parse_mode` field
    pub fn api_value(&self) -> Option<&'static str> {
        match self {
            ParseMode::Plain => None,
            ParseMode::MarkdownV2 => Some("MarkdownV2"),
        }
    }
}

/// A formatted message and where it goes
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub text: String,
    pub mode: ParseMode,
    pub destinations: Vec<String>,
}

/// Escape free text for MarkdownV2
pub fn escape_markdown_v2(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        if ch == '\\' || MARKDOWN_V2_RESERVED.contains(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Escape text placed inside a MarkdownV2 code span
fn escape_code(s: &str) -> String {
    s.replace('\\', "\\\\").replace('`', "\\`")
}

/// `$1,234,567` style rendering, whole dollars
pub fn format_usd(value: f64) -> String {
    let whole = value.round().abs() as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 && whole > 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Everything the alert shows about one new listing
pub struct ListingAlert<'a> {
    pub venue: &'a str,
    pub ticker: &'a str,
    pub found_at: &'a str,
    pub resolution: &'a ResolutionResult,
    /// Venue homepage, shown as the last line when known
    pub venue_url: Option<&'a str>,
}

impl ListingAlert<'_> {
    pub fn render(&self, mode: ParseMode) -> String {
        match mode {
            ParseMode::Plain => self.render_plain(),
            ParseMode::MarkdownV2 => self.render_markdown(),
        }
    }

    fn render_markdown(&self) -> String {
        let r = self.resolution;
        let mut lines = vec![
            r"🆕 *NEW* \(LISTING DETECTED\)".to_string(),
            format!("*Exchange:* {}", escape_markdown_v2(&self.venue.to_uppercase())),
            format!("*Ticker:* {}", escape_markdown_v2(self.ticker)),
        ];

        if let Some(chain) = &r.chain {
            lines.push(format!("*Chain:* {}", escape_markdown_v2(chain)));
        }

        let contract = match &r.contract {
            Some(c) => format!("`{}`", escape_code(c)),
            None => "n/a".to_string(),
        };
        lines.push(format!("*Contract:* {}", contract));
        lines.push(format!("*Found:* {}", escape_markdown_v2(self.found_at)));

        if let Some(market) = &r.market {
            if let Some(cap) = market.market_cap_usd {
                lines.push(format!("*Market cap:* {}", escape_markdown_v2(&format_usd(cap))));
            }
            if let Some(vol) = market.volume_24h_usd {
                lines.push(format!("*24h volume:* {}", escape_markdown_v2(&format_usd(vol))));
            }
        }
        if let Some(id) = &r.external_id {
            lines.push(format!("*CoinGecko ID:* {}", escape_markdown_v2(id)));
        }
        if let Some(url) = &r.reference_url {
            lines.push(format!("*DexScreener:* {}", escape_markdown_v2(url)));
        }
        if let Some(url) = self.venue_url {
            lines.push(format!("*Link:* {}", escape_markdown_v2(url)));
        }

        lines.join("\n")
    }

    fn render_plain(&self) -> String {
        let r = self.resolution;
        let mut lines = vec![
            "🆕 NEW (LISTING DETECTED)".to_string(),
            format!("Exchange: {}", self.venue.to_uppercase()),
            format!("Ticker: {}", self.ticker),
        ];
        if let Some(chain) = &r.chain {
            lines.push(format!("Chain: {}", chain));
        }
        lines.push(format!("Contract: {}", r.contract.as_deref().unwrap_or("n/a")));
        lines.push(format!("Found: {}", self.found_at));
        if let Some(market) = &r.market {
            if let Some(cap) = market.market_cap_usd {
                lines.push(format!("Market cap: {}", format_usd(cap)));
            }
            if let Some(vol) = market.volume_24h_usd {
                lines.push(format!("24h volume: {}", format_usd(vol)));
            }
        }
        if let Some(id) = &r.external_id {
            lines.push(format!("CoinGecko ID: {}", id));
        }
        if let Some(url) = &r.reference_url {
            lines.push(format!("DexScreener: {}", url));
        }
        if let Some(url) = self.venue_url {
            lines.push(format!("Link: {}", url));
        }
        lines.join("\n")
    }
}
