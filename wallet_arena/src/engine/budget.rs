//! Provider call budget tracking for the lifecycle engine.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Current budget occupancy
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetStatus {
    pub hourly_used: u32,
    pub hourly_limit: u32,
    pub daily_used: u32,
    pub daily_limit: u32,
}

#[derive(Debug)]
struct BudgetWindows {
    hour_start: DateTime<Utc>,
    hour_used: u32,
    day_start: DateTime<Utc>,
    day_used: u32,
}

/// Hourly/daily caps on external snapshot-provider calls.
///
/// The engine reserves an estimated call count before each snapshot batch;
/// an exhausted budget postpones the batch until a window rolls over, when
/// the next poll pass picks the transition up again. Reserve-and-count is a
/// single locked step so concurrent batches cannot overrun the cap together.
pub struct CallBudget {
    hourly_limit: u32,
    daily_limit: u32,
    windows: Mutex<BudgetWindows>,
}

impl CallBudget {
    /// Create a budget with the given hourly and daily call caps
    pub fn new(hourly_limit: u32, daily_limit: u32) -> Self {
        let now = Utc::now();
        Self {
            hourly_limit,
            daily_limit,
            windows: Mutex::new(BudgetWindows {
                hour_start: now,
                hour_used: 0,
                day_start: now,
                day_used: 0,
            }),
        }
    }

    /// A budget that never postpones anything
    pub fn unlimited() -> Self {
        Self::new(u32::MAX, u32::MAX)
    }

    /// Reserve `calls` against both windows, rolling them over first.
    ///
    /// Returns false (reserving nothing) if either window lacks room.
    pub fn try_reserve(&self, calls: u32, now: DateTime<Utc>) -> bool {
        let mut windows = self.windows.lock().expect("budget lock poisoned");

        if now - windows.hour_start >= Duration::hours(1) {
            windows.hour_start = now;
            windows.hour_used = 0;
        }
        if now - windows.day_start >= Duration::days(1) {
            windows.day_start = now;
            windows.day_used = 0;
        }

        let hour_fits = windows.hour_used.saturating_add(calls) <= self.hourly_limit;
        let day_fits = windows.day_used.saturating_add(calls) <= self.daily_limit;
        if !hour_fits || !day_fits {
            return false;
        }

        windows.hour_used = windows.hour_used.saturating_add(calls);
        windows.day_used = windows.day_used.saturating_add(calls);
        true
    }

    /// Snapshot of current usage
    pub fn status(&self, now: DateTime<Utc>) -> BudgetStatus {
        let windows = self.windows.lock().expect("budget lock poisoned");
        let hour_expired = now - windows.hour_start >= Duration::hours(1);
        let day_expired = now - windows.day_start >= Duration::days(1);
        BudgetStatus {
            hourly_used: if hour_expired { 0 } else { windows.hour_used },
            hourly_limit: self.hourly_limit,
            daily_used: if day_expired { 0 } else { windows.day_used },
            daily_limit: self.daily_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserves_until_hourly_cap() {
        let budget = CallBudget::new(50, 1000);
        let now = Utc::now();

        assert!(budget.try_reserve(25, now));
        assert!(budget.try_reserve(25, now));
        assert!(!budget.try_reserve(1, now));
        assert_eq!(budget.status(now).hourly_used, 50);
    }

    #[test]
    fn test_failed_reserve_consumes_nothing() {
        let budget = CallBudget::new(50, 1000);
        let now = Utc::now();

        assert!(budget.try_reserve(40, now));
        assert!(!budget.try_reserve(20, now));
        // The failed reservation left room for a smaller batch
        assert!(budget.try_reserve(10, now));
    }

    #[test]
    fn test_hour_window_rolls_over() {
        let budget = CallBudget::new(50, 1000);
        let now = Utc::now();

        assert!(budget.try_reserve(50, now));
        assert!(!budget.try_reserve(10, now));

        let later = now + Duration::minutes(61);
        assert!(budget.try_reserve(10, later));
        assert_eq!(budget.status(later).hourly_used, 10);
    }

    #[test]
    fn test_daily_cap_outlives_hourly_resets() {
        let budget = CallBudget::new(100, 150);
        let now = Utc::now();

        assert!(budget.try_reserve(100, now));
        let hour_two = now + Duration::hours(1);
        assert!(budget.try_reserve(50, hour_two));
        // Hourly window is fresh but the day is spent
        assert!(!budget.try_reserve(10, hour_two + Duration::minutes(90)));

        let tomorrow = now + Duration::days(1);
        assert!(budget.try_reserve(10, tomorrow));
    }

    #[test]
    fn test_unlimited_budget_never_blocks() {
        let budget = CallBudget::unlimited();
        let now = Utc::now();
        assert!(budget.try_reserve(1_000_000, now));
        assert!(budget.try_reserve(u32::MAX, now));
    }
}
