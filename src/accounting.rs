use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

use crate::clock::Clock;

/// Every call past nine tenths of the daily ceiling logs a warning.
fn over_threshold(count: u64, max_daily: u64) -> bool {
    u128::from(count) * 10 > u128::from(max_daily) * 9
}

#[derive(Debug, Clone, Copy)]
struct CallCounter {
    count: u64,
    day: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageStatus {
    pub count: u64,
    pub remaining: i64,
    pub daily_limit: u64,
}

/// Counts upstream calls per local calendar day.
///
/// Purely advisory: crossing the ceiling only produces log warnings, calls are
/// never rejected.
pub struct CallAccountant {
    counter: Mutex<CallCounter>,
    max_daily: u64,
    clock: Arc<dyn Clock>,
}

impl CallAccountant {
    pub fn new(max_daily: u64, clock: Arc<dyn Clock>) -> Self {
        let day = clock.now().date_naive();
        Self {
            counter: Mutex::new(CallCounter { count: 0, day }),
            max_daily,
            clock,
        }
    }

    /// Records one attempted upstream call and returns the count for today.
    pub fn track(&self) -> u64 {
        let today = self.clock.now().date_naive();

        let count = {
            let mut counter = self.counter.lock();
            if counter.day != today {
                tracing::info!(
                    "New day {}, resetting API call counter (was {})",
                    today,
                    counter.count
                );
                counter.count = 0;
                counter.day = today;
            }
            counter.count += 1;
            counter.count
        };

        if over_threshold(count, self.max_daily) {
            tracing::warn!("Approaching API limit: {}/{}", count, self.max_daily);
        }

        count
    }

    pub fn status(&self) -> UsageStatus {
        let today = self.clock.now().date_naive();
        let counter = *self.counter.lock();
        // A stale day means the next track() starts over.
        let count = if counter.day == today { counter.count } else { 0 };

        UsageStatus {
            count,
            remaining: self.max_daily as i64 - count as i64,
            daily_limit: self.max_daily,
        }
    }
}
