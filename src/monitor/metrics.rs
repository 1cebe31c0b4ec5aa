use serde::Serialize;

use super::window::RollingWindow;

/// Point-in-time view of the render counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_renders: u64,
    /// Share of renders that did not need the fallback, in `[0, 1]`
    pub success_rate: f64,
    /// Share of cache lookups that hit, in `[0, 1]`
    pub cache_hit_rate: f64,
    /// Mean backend render time over the duration window, in milliseconds
    pub average_duration: f64,
    pub active_renders: usize,
    pub retries: u64,
    pub fallbacks: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct Counters {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub retries: u64,
    pub active: usize,
    pub durations: RollingWindow<f64>,
}

impl Counters {
    pub fn new(duration_window: usize) -> Self {
        Self {
            total: 0,
            successes: 0,
            failures: 0,
            cache_hits: 0,
            cache_misses: 0,
            retries: 0,
            active: 0,
            durations: RollingWindow::new(duration_window),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let ratio = |part: u64, whole: u64| if whole == 0 { 0.0 } else { part as f64 / whole as f64 };
        MetricsSnapshot {
            total_renders: self.total,
            success_rate: ratio(self.successes, self.total),
            cache_hit_rate: ratio(self.cache_hits, self.cache_hits + self.cache_misses),
            average_duration: self.durations.average(),
            active_renders: self.active,
            retries: self.retries,
            fallbacks: self.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_has_zero_rates() {
        let snapshot = Counters::new(10).snapshot();
        assert_eq!(snapshot.total_renders, 0);
        assert_eq!(snapshot.success_rate, 0.0);
        assert_eq!(snapshot.cache_hit_rate, 0.0);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let mut counters = Counters::new(10);
        counters.total = 4;
        counters.successes = 3;
        counters.cache_hits = 1;
        counters.cache_misses = 3;
        counters.durations.push(12.0);

        let json = serde_json::to_value(counters.snapshot()).unwrap();
        assert_eq!(json["totalRenders"], 4);
        assert_eq!(json["successRate"], 0.75);
        assert_eq!(json["cacheHitRate"], 0.25);
        assert_eq!(json["averageDuration"], 12.0);
        assert_eq!(json["activeRenders"], 0);
    }
}
