//! Daily token budget with a local-midnight reset.

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use tracing::info;

/// Tokens spent against a daily ceiling.
#[derive(Debug, Clone, Serialize)]
pub struct TokenBudget {
    used: u64,
    budget: u64,
    reset_at: DateTime<Utc>,
}

impl TokenBudget {
    /// A fresh budget that resets at the next local midnight.
    pub fn new(budget: u64) -> Self {
        Self::starting_at(budget, Utc::now())
    }

    /// A fresh budget as if created at `now`.
    pub fn starting_at(budget: u64, now: DateTime<Utc>) -> Self {
        Self {
            used: 0,
            budget,
            reset_at: next_midnight_after(now, &Local),
        }
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        self.reset_at
    }

    pub fn remaining(&self) -> u64 {
        self.budget.saturating_sub(self.used)
    }

    /// Add spent tokens.
    pub fn record(&mut self, tokens: u64) {
        self.used = self.used.saturating_add(tokens);
    }

    /// `used / budget`. A zero budget counts as exhausted.
    pub fn usage_ratio(&self) -> f64 {
        if self.budget == 0 {
            return 1.0;
        }
        self.used as f64 / self.budget as f64
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_ratio() >= 1.0
    }

    /// Zero the counter if the reset instant has passed.
    ///
    /// However late this is called, one call resets once and moves
    /// `reset_at` past `now`, so a second call in the same period is a no-op.
    pub fn maybe_reset(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.reset_at {
            return false;
        }
        info!(used = self.used, budget = self.budget, "Daily token budget reset");
        self.used = 0;
        self.reset_at = next_midnight_after(now, &Local);
        true
    }
}

/// The first midnight in `tz` strictly after `now`.
pub fn next_midnight_after<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local = now.with_timezone(tz);
    let tomorrow = local.date_naive() + Days::new(1);
    let midnight = tomorrow.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        // Midnight skipped by a DST jump
        .unwrap_or_else(|| now + chrono::Duration::hours(24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    #[test]
    fn records_and_ratios() {
        let mut budget = TokenBudget::new(1_000);
        budget.record(250);
        assert_eq!(budget.used(), 250);
        assert_eq!(budget.remaining(), 750);
        assert!((budget.usage_ratio() - 0.25).abs() < f64::EPSILON);
        budget.record(800);
        assert!(budget.is_exhausted());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn zero_budget_is_exhausted() {
        assert!(TokenBudget::new(0).is_exhausted());
    }

    #[test]
    fn midnight_in_fixed_offset() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        // 2024-03-10 21:30 UTC is 23:30 at +02:00
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 21, 30, 0).unwrap();
        let next = next_midnight_after(now, &tz);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 10, 22, 0, 0).unwrap());

        // Exactly at midnight moves to the following one
        let next_again = next_midnight_after(next, &tz);
        assert_eq!(next_again - next, Duration::hours(24));
    }

    #[test]
    fn reset_happens_once_per_period() {
        let start = Utc::now();
        let mut budget = TokenBudget::starting_at(1_000, start);
        budget.record(900);

        assert!(!budget.maybe_reset(start));
        assert_eq!(budget.used(), 900);

        let after = budget.reset_at() + Duration::seconds(1);
        assert!(budget.maybe_reset(after));
        assert_eq!(budget.used(), 0);
        assert!(budget.reset_at() > after);

        budget.record(10);
        assert!(!budget.maybe_reset(after + Duration::seconds(30)));
        assert_eq!(budget.used(), 10);
    }

    #[test]
    fn late_check_still_resets_once() {
        let start = Utc::now();
        let mut budget = TokenBudget::starting_at(1_000, start);
        budget.record(500);

        // Three days of missed ticks
        let late = start + Duration::days(3);
        assert!(budget.maybe_reset(late));
        assert!(!budget.maybe_reset(late));
        assert!(budget.reset_at() > late);
        assert!(budget.reset_at() <= late + Duration::hours(25));
    }
}
