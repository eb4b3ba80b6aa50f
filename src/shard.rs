//! Shard slots
//!
//! A shard is one fixed-width bucket of the time axis. Each slot holds the
//! points cached for its bucket, sorted ascending by time and unique by
//! time, plus a presence state that records how far its fetch lifecycle
//! has advanced.

use serde::{Deserialize, Serialize};

use crate::point::DataPoint;

/// Identifies a shard by the start time of its bucket
///
/// Always a non-negative multiple of the cache's shard size.
pub type ShardId = i64;

/// Fetch lifecycle state of a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardState {
    /// Never fetched; holds no authoritative data
    Absent,
    /// A fetch has been dispatched and has not yet resolved
    Pending,
    /// Holds an authoritative (possibly empty) result
    Present,
}

impl std::fmt::Display for ShardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Pending => write!(f, "pending"),
            Self::Present => write!(f, "present"),
        }
    }
}

/// One bucket of cached points plus its presence state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    state: ShardState,
    points: Vec<DataPoint>,
}

impl Default for Shard {
    fn default() -> Self {
        Self::new()
    }
}

impl Shard {
    /// Create an empty, never-fetched shard
    pub fn new() -> Self {
        Self {
            state: ShardState::Absent,
            points: Vec::new(),
        }
    }

    /// Current presence state
    pub fn state(&self) -> ShardState {
        self.state
    }

    /// True iff the shard holds an authoritative result
    ///
    /// An empty Present shard still counts: the fetch resolved and the
    /// bucket is known to be empty.
    pub fn has_data(&self) -> bool {
        self.state == ShardState::Present
    }

    /// True iff a fetch is outstanding for this shard
    pub fn is_pending(&self) -> bool {
        self.state == ShardState::Pending
    }

    /// The cached points, sorted ascending by time
    ///
    /// Empty for Absent and Pending shards; never fabricates data.
    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    /// Number of cached points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True iff no points are cached
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Mark a fetch as dispatched
    ///
    /// Only an Absent shard advances; Present stays Present.
    pub(crate) fn mark_pending(&mut self) {
        if self.state == ShardState::Absent {
            self.state = ShardState::Pending;
        }
    }

    /// Revert a failed fetch so a later one can be attempted
    pub(crate) fn mark_absent(&mut self) {
        if self.state == ShardState::Pending {
            self.state = ShardState::Absent;
        }
    }

    /// Replace the shard's contents with an authoritative result
    ///
    /// The caller has already validated and normalized `points`
    /// (deduplicated by time, sorted ascending).
    pub(crate) fn commit(&mut self, points: Vec<DataPoint>) {
        self.points = points;
        self.state = ShardState::Present;
    }

    /// Insert or overwrite a single point, keeping sort order
    ///
    /// Two points never share a time: inserting at an existing time
    /// overwrites the value (last write wins). Marks the shard Present.
    pub(crate) fn upsert(&mut self, point: DataPoint) {
        match self.points.binary_search_by_key(&point.time, |p| p.time) {
            Ok(pos) => self.points[pos] = point,
            Err(pos) => self.points.insert(pos, point),
        }
        self.state = ShardState::Present;
    }

    /// Times of all cached points (test helper for order assertions)
    #[cfg(test)]
    pub(crate) fn times(&self) -> Vec<crate::point::Time> {
        self.points.iter().map(|p| p.time).collect()
    }
}
