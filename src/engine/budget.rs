use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window budgets for outgoing trade transactions, keyed by
/// rate-limit bucket. Each algorithm class runs against its own bucket,
/// so turbo trades never count toward the default cap and vice versa.
/// Claims and split transfers do not pass through here.
#[derive(Default)]
pub struct TradeBudget {
    sent: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl TradeBudget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one trade slot in `bucket` if fewer than `cap` trades
    /// left that bucket in the last 60 seconds.
    pub fn try_consume(&self, bucket: &str, cap: u32) -> bool {
        let now = Instant::now();
        let mut sent = self.sent.lock().unwrap_or_else(|p| p.into_inner());
        let entry = sent.entry(bucket.to_string()).or_default();

        while entry.front().is_some_and(|t| now.duration_since(*t) > WINDOW) {
            entry.pop_front();
        }
        if entry.len() >= cap as usize {
            return false;
        }
        entry.push_back(now);
        true
    }

    pub fn in_window(&self, bucket: &str) -> usize {
        let now = Instant::now();
        let mut sent = self.sent.lock().unwrap_or_else(|p| p.into_inner());
        let Some(entry) = sent.get_mut(bucket) else {
            return 0;
        };
        while entry.front().is_some_and(|t| now.duration_since(*t) > WINDOW) {
            entry.pop_front();
        }
        entry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_is_enforced_within_the_window() {
        let budget = TradeBudget::new();
        for _ in 0..5 {
            assert!(budget.try_consume("main", 5));
        }
        assert!(!budget.try_consume("main", 5));
        assert_eq!(budget.in_window("main"), 5);
    }

    #[test]
    fn a_higher_cap_admits_more() {
        let budget = TradeBudget::new();
        for _ in 0..5 {
            assert!(budget.try_consume("main", 5));
        }
        assert!(budget.try_consume("main", 6));
    }

    #[test]
    fn buckets_do_not_interfere() {
        let budget = TradeBudget::new();
        for _ in 0..5 {
            assert!(budget.try_consume("main", 5));
        }
        assert!(!budget.try_consume("main", 5));

        // A saturated main bucket leaves the turbo bucket untouched.
        assert!(budget.try_consume("turbo", 5));
        assert_eq!(budget.in_window("turbo"), 1);
        assert_eq!(budget.in_window("main"), 5);
    }

    #[test]
    fn unknown_bucket_is_empty() {
        let budget = TradeBudget::new();
        assert_eq!(budget.in_window("never-used"), 0);
    }
}
