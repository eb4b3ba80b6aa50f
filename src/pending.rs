//! In-flight fetch tracking
//!
//! A set of shard ids with an outstanding fetch. The tracker is consulted
//! before every dispatch so that at most one fetch is ever in flight per
//! shard; `mark_pending` performs the check and the mark in one call so
//! the sequence stays atomic under the cache's lock.

use std::collections::HashSet;

use crate::shard::ShardId;

/// Tracks which shards have a fetch mid-flight
#[derive(Debug, Default)]
pub struct PendingRequestTracker {
    pending: HashSet<ShardId>,
}

impl PendingRequestTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a fetch as dispatched for `id`
    ///
    /// Returns `true` if the id was newly marked, `false` if a fetch was
    /// already outstanding (the caller must not dispatch again).
    pub fn mark_pending(&mut self, id: ShardId) -> bool {
        self.pending.insert(id)
    }

    /// Clear the outstanding fetch for `id`, if any
    pub fn clear_pending(&mut self, id: ShardId) {
        self.pending.remove(&id);
    }

    /// True iff a fetch is outstanding for `id`
    pub fn is_pending(&self, id: ShardId) -> bool {
        self.pending.contains(&id)
    }

    /// Number of outstanding fetches
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True iff no fetches are outstanding
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_is_idempotent() {
        let mut tracker = PendingRequestTracker::new();
        assert!(tracker.mark_pending(60000));
        assert!(!tracker.mark_pending(60000));
        assert!(tracker.is_pending(60000));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_clear_releases_for_redispatch() {
        let mut tracker = PendingRequestTracker::new();
        tracker.mark_pending(0);
        tracker.clear_pending(0);
        assert!(!tracker.is_pending(0));
        assert!(tracker.is_empty());
        // A cleared id can be marked again.
        assert!(tracker.mark_pending(0));
    }

    #[test]
    fn test_clear_unknown_id_is_a_noop() {
        let mut tracker = PendingRequestTracker::new();
        tracker.clear_pending(120000);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_ids_are_independent() {
        let mut tracker = PendingRequestTracker::new();
        tracker.mark_pending(0);
        tracker.mark_pending(60000);
        tracker.clear_pending(0);
        assert!(!tracker.is_pending(0));
        assert!(tracker.is_pending(60000));
    }
}
