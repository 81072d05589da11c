//! Send-rate limiter shared by every destination in the process
//!
//! Each attempt reserves the next free slot: at least `min_interval` (plus
//! random jitter) after the previous slot, and never before a hold imposed
//! by the remote side. Jitter keeps separate shard processes that share the
//! same bot token from firing in lockstep.

use rand::Rng;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

#[derive(Debug, Default)]
struct LimiterState {
    /// Start of the most recently reserved send slot
    last_send: Option<Instant>,
    /// Remote-imposed earliest next send
    hold_until: Option<Instant>,
}

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    max_jitter: Duration,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, max_jitter: Duration) -> Self {
        Self {
            min_interval,
            max_jitter,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Wait for the next send slot and claim it
    pub async fn acquire(&self) {
        let spacing = self.min_interval + self.jitter();
        let slot = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let mut slot = now;
            if let Some(last) = state.last_send {
                slot = slot.max(last + spacing);
            }
            if let Some(hold) = state.hold_until {
                slot = slot.max(hold);
            }
            state.last_send = Some(slot);
            slot
        };

        let now = Instant::now();
        if slot > now {
            debug!(wait_ms = (slot - now).as_millis() as u64, "Rate limiter wait");
            sleep_until(slot).await;
        }
    }

    /// Push the next allowed send out by `delay` from now.
    ///
    /// Applies to every destination, not only the one that was throttled.
    pub fn hold_for(&self, delay: Duration) {
        let until = Instant::now() + delay;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.hold_until = Some(state.hold_until.map_or(until, |h| h.max(until)));
    }

    fn jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let ms = rand::thread_rng().gen_range(0..=self.max_jitter.as_millis() as u64);
        Duration::from_millis(ms)
    }
}
