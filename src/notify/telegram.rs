//! Notification transports
//!
//! `TelegramTransport` talks to the Bot API. `LogTransport` only logs, for
//! dry runs. Both report one attempt as a `SendOutcome` and leave retrying
//! to the notifier.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::NotifierConfig;
use crate::notify::message::ParseMode;
use crate::sources::USER_AGENT;

/// Fallback wait when a 429 carries no retry hint
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Result of a single send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Remote asked us to wait this long before sending anything
    RateLimited(Duration),
    /// Network failure or 5xx
    Transient(String),
    /// 4xx other than 429; retrying will not help
    Rejected(String),
}

#[async_trait]
pub trait NotifyTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, destination: &str, text: &str, mode: ParseMode) -> SendOutcome;
}

pub struct TelegramTransport {
    client: reqwest::Client,
    api_base: String,
    token: String,
    disable_web_page_preview: bool,
}

impl TelegramTransport {
    pub fn new(config: &NotifierConfig) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            disable_web_page_preview: config.disable_web_page_preview,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl NotifyTransport for TelegramTransport {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, destination: &str, text: &str, mode: ParseMode) -> SendOutcome {
        let mut body = json!({
            "chat_id": destination,
            "text": text,
            "disable_web_page_preview": self.disable_web_page_preview,
        });
        if let Some(parse_mode) = mode.api_value() {
            body["parse_mode"] = json!(parse_mode);
        }

        let resp = match self.client.post(self.endpoint()).json(&body).send().await {
            Ok(resp) => resp,
            // Strip the URL so the bot token never reaches the logs
            Err(e) => return SendOutcome::Transient(e.without_url().to_string()),
        };

        let status = resp.status();
        if status.is_success() {
            debug!(chat_id = %destination, "Telegram message accepted");
            return SendOutcome::Sent;
        }

        let header_retry = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = resp.text().await.unwrap_or_default();

        classify_response(status.as_u16(), &body, header_retry)
    }
}

/// Map a non-2xx Bot API response to an outcome
pub fn classify_response(status: u16, body: &str, header_retry_secs: Option<u64>) -> SendOutcome {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let description = parsed
        .as_ref()
        .and_then(|v| v.get("description"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()));

    match status {
        429 => {
            let retry_after = parsed
                .as_ref()
                .and_then(|v| v.pointer("/parameters/retry_after"))
                .and_then(Value::as_u64)
                .or(header_retry_secs)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_AFTER);
            SendOutcome::RateLimited(retry_after)
        }
        s if s >= 500 => SendOutcome::Transient(description),
        _ => SendOutcome::Rejected(description),
    }
}

/// Logs messages instead of sending them
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl NotifyTransport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, destination: &str, text: &str, _mode: ParseMode) -> SendOutcome {
        info!(destination = %destination, "[dry-run] notification:\n{}", text);
        SendOutcome::Sent
    }
}
