//! Run budgets and venue sharding

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{ScanConfig, VenueConfig};

/// Which budget ended work early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStop {
    /// Whole-run wall clock
    RunTime,
    /// Current venue's wall clock; only that venue stops
    VenueTime,
    Notifications,
}

impl BudgetStop {
    /// Whether the whole run ends, not just the current venue
    pub fn ends_run(&self) -> bool {
        !matches!(self, BudgetStop::VenueTime)
    }
}

impl fmt::Display for BudgetStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetStop::RunTime => write!(f, "run time budget"),
            BudgetStop::VenueTime => write!(f, "venue time budget"),
            BudgetStop::Notifications => write!(f, "notification budget"),
        }
    }
}

/// Polled budget checks for one scan. Zero limits mean unlimited.
///
/// Nothing is cancelled mid-call, so the time budgets are soft ceilings:
/// overshoot is bounded by the slowest single step.
#[derive(Debug)]
pub struct RunBudget {
    started: Instant,
    max_run: Option<Duration>,
    max_venue: Option<Duration>,
    max_notifications: Option<usize>,
    notified: usize,
}

impl RunBudget {
    pub fn new(max_run: Duration, max_venue: Duration, max_notifications: usize) -> Self {
        Self {
            started: Instant::now(),
            max_run: Some(max_run).filter(|d| !d.is_zero()),
            max_venue: Some(max_venue).filter(|d| !d.is_zero()),
            max_notifications: Some(max_notifications).filter(|n| *n > 0),
            notified: 0,
        }
    }

    pub fn from_config(scan: &ScanConfig) -> Self {
        Self::new(
            Duration::from_secs(scan.max_run_secs),
            Duration::from_secs(scan.max_venue_secs),
            scan.max_notifications_per_run,
        )
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn record_notification(&mut self) {
        self.notified += 1;
    }

    /// Run-level budgets only
    pub fn run_stop(&self) -> Option<BudgetStop> {
        if self.max_run.is_some_and(|max| self.started.elapsed() > max) {
            return Some(BudgetStop::RunTime);
        }
        if self.max_notifications.is_some_and(|max| self.notified >= max) {
            return Some(BudgetStop::Notifications);
        }
        None
    }

    /// Run-level budgets, then the venue clock started at `venue_started`
    pub fn check(&self, venue_started: Instant) -> Option<BudgetStop> {
        self.run_stop().or_else(|| {
            self.max_venue
                .filter(|max| venue_started.elapsed() > *max)
                .map(|_| BudgetStop::VenueTime)
        })
    }
}

/// Venues for one shard: index `i` belongs to shard `i % total`, then the
/// list is cut to `max_venues` (0 = no cap)
pub fn shard_venues(
    venues: &[VenueConfig],
    shard_index: usize,
    shard_total: usize,
    max_venues: usize,
) -> Vec<&VenueConfig> {
    let total = shard_total.max(1);
    let cap = if max_venues == 0 { usize::MAX } else { max_venues };
    venues
        .iter()
        .enumerate()
        .filter(|(i, _)| i % total == shard_index)
        .map(|(_, v)| v)
        .take(cap)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venues(n: usize) -> Vec<VenueConfig> {
        (0..n)
            .map(|i| VenueConfig {
                id: format!("v{}", i),
                currencies_url: format!("https://v{}.example", i),
                www_url: None,
            })
            .collect()
    }

    fn ids(shard: &[&VenueConfig]) -> Vec<String> {
        shard.iter().map(|v| v.id.clone()).collect()
    }

    #[test]
    fn test_shards_partition_venues() {
        let all = venues(10);
        let mut seen = Vec::new();
        for index in 0..3 {
            let shard = shard_venues(&all, index, 3, 0);
            seen.extend(ids(&shard));
        }
        seen.sort();
        let mut expected: Vec<String> = all.iter().map(|v| v.id.clone()).collect();
        expected.sort();
        assert_eq!(seen, expected);

        assert_eq!(ids(&shard_venues(&all, 1, 3, 0)), vec!["v1", "v4", "v7"]);
    }

    #[test]
    fn test_shard_cap() {
        let all = venues(10);
        assert_eq!(ids(&shard_venues(&all, 0, 2, 2)), vec!["v0", "v2"]);
        assert_eq!(shard_venues(&all, 0, 1, 0).len(), 10);
    }

    #[test]
    fn test_shard_index_out_of_range_is_empty() {
        assert!(shard_venues(&venues(4), 5, 2, 0).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_time_budget() {
        let budget = RunBudget::new(Duration::from_secs(1), Duration::ZERO, 0);
        assert_eq!(budget.run_stop(), None);
        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(budget.run_stop(), Some(BudgetStop::RunTime));
    }

    #[tokio::test(start_paused = true)]
    async fn test_venue_budget_is_per_venue() {
        let budget = RunBudget::new(Duration::from_secs(60), Duration::from_secs(2), 0);
        let first_venue = Instant::now();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(budget.check(first_venue), Some(BudgetStop::VenueTime));

        let second_venue = Instant::now();
        assert_eq!(budget.check(second_venue), None);
    }

    #[test]
    fn test_notification_budget() {
        let mut budget = RunBudget::new(Duration::ZERO, Duration::ZERO, 2);
        budget.record_notification();
        assert_eq!(budget.run_stop(), None);
        budget.record_notification();
        assert_eq!(budget.run_stop(), Some(BudgetStop::Notifications));
        assert!(BudgetStop::Notifications.ends_run());
        assert!(!BudgetStop::VenueTime.ends_run());
    }

    #[test]
    fn test_zero_limits_are_unlimited() {
        let mut budget = RunBudget::new(Duration::ZERO, Duration::ZERO, 0);
        for _ in 0..1000 {
            budget.record_notification();
        }
        assert_eq!(budget.check(Instant::now()), None);
    }
}
