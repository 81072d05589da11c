//! Rate-limited, retrying fan-out of one message to every destination

use backoff::{future::retry, ExponentialBackoff};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::NotifierConfig;
use crate::notify::limiter::RateLimiter;
use crate::notify::message::NotificationMessage;
use crate::notify::telegram::{NotifyTransport, SendOutcome};

/// Why a destination was given up on
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeliveryError {
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per destination, whatever the failure kind
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &NotifierConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_backoff,
            initial_interval: self.base_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Per-message tally, logged after fan-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub abandoned: usize,
}

pub struct Notifier {
    transport: Arc<dyn NotifyTransport>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl Notifier {
    pub fn new(transport: Arc<dyn NotifyTransport>, limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            limiter,
            policy,
        }
    }

    pub fn from_config(config: &NotifierConfig, transport: Arc<dyn NotifyTransport>) -> Self {
        let limiter = RateLimiter::new(
            Duration::from_millis(config.min_interval_ms),
            Duration::from_millis(config.jitter_ms),
        );
        Self::new(transport, Arc::new(limiter), RetryPolicy::from_config(config))
    }

    /// Send `message` to each destination in turn.
    ///
    /// Failures are logged and swallowed; one bad destination never stops
    /// the others.
    pub async fn deliver(&self, message: &NotificationMessage) {
        let mut report = DeliveryReport::default();

        for destination in &message.destinations {
            match self.deliver_one(destination, message).await {
                Ok(attempts) => {
                    report.delivered += 1;
                    debug!(destination = %destination, attempts, "Notification delivered");
                }
                Err(e) => {
                    report.abandoned += 1;
                    warn!(destination = %destination, error = %e, "Notification abandoned");
                }
            }
        }

        info!(
            transport = self.transport.name(),
            delivered = report.delivered,
            abandoned = report.abandoned,
            "Notification fan-out complete"
        );
    }

    /// Retry loop for a single destination; returns attempts used
    async fn deliver_one(&self, destination: &str, message: &NotificationMessage) -> Result<u32, DeliveryError> {
        let attempts = AtomicU32::new(0);
        let max_attempts = self.policy.max_attempts;

        retry(self.policy.backoff(), || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let exhausted = attempt >= max_attempts;

            self.limiter.acquire().await;

            match self.transport.send(destination, &message.text, message.mode).await {
                SendOutcome::Sent => Ok(attempt),
                SendOutcome::RateLimited(wait) => {
                    // Hold every destination, not only this one
                    self.limiter.hold_for(wait);
                    warn!(destination = %destination, attempt, wait_ms = wait.as_millis() as u64, "Rate limited by endpoint");
                    let err = DeliveryError::RateLimited(wait);
                    if exhausted {
                        Err(backoff::Error::permanent(err))
                    } else {
                        // The limiter already waits out the hold
                        Err(backoff::Error::retry_after(err, Duration::ZERO))
                    }
                }
                SendOutcome::Transient(reason) => {
                    warn!(destination = %destination, attempt, reason = %reason, "Transient send failure");
                    let err = DeliveryError::Transient(reason);
                    if exhausted {
                        Err(backoff::Error::permanent(err))
                    } else {
                        Err(backoff::Error::transient(err))
                    }
                }
                SendOutcome::Rejected(reason) => Err(backoff::Error::permanent(DeliveryError::Rejected(reason))),
            }
        })
        .await
    }
}
