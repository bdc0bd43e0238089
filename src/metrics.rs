//! Plain counters for operational visibility. Shipping them to a collector
//! (Prometheus, statsd, ...) is outside this crate; `Replica::metrics`
//! exposes a read-only snapshot for an external exporter to poll.
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    pub pre_accept_sent: AtomicU64,
    pub pre_accept_ok_sent: AtomicU64,
    pub accept_sent: AtomicU64,
    pub accept_ok_sent: AtomicU64,
    pub commit_sent: AtomicU64,
    pub prepare_sent: AtomicU64,
    pub prepare_ok_sent: AtomicU64,
    pub nack_sent: AtomicU64,
    pub fast_commits: AtomicU64,
    pub slow_commits: AtomicU64,
    pub recoveries_started: AtomicU64,
    pub instances_executed: AtomicU64,
    /// Gauge: committed-but-not-yet-executed vertex count in the executor's
    /// dependency graph, as of the last time it was updated.
    pub graph_size: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fast_commit(&self) {
        self.fast_commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_slow_commit(&self) {
        self.slow_commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recovery_started(&self) {
        self.recoveries_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_executed(&self, count: u64) {
        self.instances_executed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn set_graph_size(&self, size: u64) {
        self.graph_size.store(size, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fast_commits: self.fast_commits.load(Ordering::Relaxed),
            slow_commits: self.slow_commits.load(Ordering::Relaxed),
            recoveries_started: self.recoveries_started.load(Ordering::Relaxed),
            instances_executed: self.instances_executed.load(Ordering::Relaxed),
            graph_size: self.graph_size.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time read of the counters that matter most for dashboards;
/// the individual send/receive counters are available directly off
/// [`Metrics`] for finer-grained polling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub fast_commits: u64,
    pub slow_commits: u64,
    pub recoveries_started: u64,
    pub instances_executed: u64,
    pub graph_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_fast_commit();
        metrics.record_fast_commit();
        metrics.record_slow_commit();
        metrics.record_executed(3);
        metrics.set_graph_size(7);
        let snap = metrics.snapshot();
        assert_eq!(snap.fast_commits, 2);
        assert_eq!(snap.slow_commits, 1);
        assert_eq!(snap.instances_executed, 3);
        assert_eq!(snap.graph_size, 7);
    }
}
