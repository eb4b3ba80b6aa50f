use std::sync::atomic::{AtomicU64, Ordering};

/// Performance metrics collector for a cache instance
#[derive(Debug, Default)]
pub struct MetricsCollector {
    // Fetch lifecycle counts
    /// Number of fetches handed to the fetch source
    fetches_dispatched: AtomicU64,
    /// Number of dispatch attempts skipped because the shard was
    /// already Present or Pending
    fetches_coalesced: AtomicU64,
    /// Number of fetches that resolved successfully
    fetches_completed: AtomicU64,
    /// Number of fetches that resolved with a failure
    fetches_failed: AtomicU64,

    // Data metrics
    /// Number of points committed through fetches and writes
    points_inserted: AtomicU64,
    /// Number of read operations served
    read_count: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment dispatched fetches
    pub fn increment_dispatched(&self) {
        self.fetches_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment coalesced dispatch attempts
    pub fn increment_coalesced(&self) {
        self.fetches_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment completed fetches
    pub fn increment_completed(&self) {
        self.fetches_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment failed fetches
    pub fn increment_failed(&self) {
        self.fetches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Add committed points
    pub fn add_points_inserted(&self, count: usize) {
        self.points_inserted.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Increment read operations
    pub fn increment_reads(&self) {
        self.read_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fetches_dispatched: self.fetches_dispatched.load(Ordering::Relaxed),
            fetches_coalesced: self.fetches_coalesced.load(Ordering::Relaxed),
            fetches_completed: self.fetches_completed.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            points_inserted: self.points_inserted.load(Ordering::Relaxed),
            read_count: self.read_count.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the cache's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Fetches handed to the fetch source
    pub fetches_dispatched: u64,
    /// Dispatch attempts skipped (shard Present or Pending)
    pub fetches_coalesced: u64,
    /// Fetches that resolved successfully
    pub fetches_completed: u64,
    /// Fetches that resolved with a failure
    pub fetches_failed: u64,
    /// Points committed through fetches and writes
    pub points_inserted: u64,
    /// Read operations served
    pub read_count: u64,
}

impl MetricsSnapshot {
    /// Fetches still outstanding at snapshot time
    pub fn fetches_outstanding(&self) -> u64 {
        self.fetches_dispatched
            .saturating_sub(self.fetches_completed + self.fetches_failed)
    }
}
