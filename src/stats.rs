//! Statistics counter: a process-wide, lock-free,
//! monotonically increasing count of successfully persisted trades.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Default)]
pub struct TradeCounter {
    count: Arc<AtomicU64>,
}

impl TradeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incremented only after a successful `save_batch`, by the number of
    /// rows actually committed (the final flush may be smaller than
    /// BatchSize).
    pub fn add(&self, rows: u64) {
        self.count.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_monotonically() {
        let counter = TradeCounter::new();
        counter.add(2);
        counter.add(37);
        assert_eq!(counter.get(), 39);
    }

    #[test]
    fn counter_starts_at_zero() {
        assert_eq!(TradeCounter::new().get(), 0);
    }
}
