//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default)]
pub struct EngineStats {
    allocations: AtomicU64,
    successful_allocations: AtomicU64,
    offers_created: AtomicU64,
    offers_accepted: AtomicU64,
    offers_declined: AtomicU64,
    reallocations: AtomicU64,
    match_time_micros: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub allocations: u64,
    pub successful_allocations: u64,
    pub offers_created: u64,
    pub offers_accepted: u64,
    pub offers_declined: u64,
    pub reallocations: u64,
    pub mean_match_time_ms: f64,
}

impl EngineStats {
    pub(crate) fn record_allocation(&self, success: bool, elapsed: Duration) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_allocations.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.match_time_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub(crate) fn record_offer_created(&self) {
        self.offers_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_accept(&self) {
        self.offers_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decline(&self) {
        self.offers_declined.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reallocation(&self) {
        self.reallocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let allocations = self.allocations.load(Ordering::Relaxed);
        let total_micros = self.match_time_micros.load(Ordering::Relaxed);
        let mean_match_time_ms = if allocations == 0 {
            0.0
        } else {
            total_micros as f64 / allocations as f64 / 1000.0
        };

        StatsSnapshot {
            allocations,
            successful_allocations: self.successful_allocations.load(Ordering::Relaxed),
            offers_created: self.offers_created.load(Ordering::Relaxed),
            offers_accepted: self.offers_accepted.load(Ordering::Relaxed),
            offers_declined: self.offers_declined.load(Ordering::Relaxed),
            reallocations: self.reallocations.load(Ordering::Relaxed),
            mean_match_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_match_time() {
        let stats = EngineStats::default();
        assert_eq!(stats.snapshot().mean_match_time_ms, 0.0);

        stats.record_allocation(true, Duration::from_millis(4));
        stats.record_allocation(false, Duration::from_millis(2));

        let snap = stats.snapshot();
        assert_eq!(snap.allocations, 2);
        assert_eq!(snap.successful_allocations, 1);
        assert!((snap.mean_match_time_ms - 3.0).abs() < 1e-9);
    }
}
