//! Per-shard data ownership
//!
//! `ShardStore` owns the mapping from shard ids to shard slots and every
//! mutation of cached points. Slots are created lazily the first time an
//! operation touches their id and are never evicted; callers that need to
//! discard data drop the owning cache instance.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::indexer::ShardIndexer;
use crate::point::{DataPoint, TimeRange};
use crate::shard::{Shard, ShardId, ShardState};

/// Owns shard contents and presence state for one cache instance
#[derive(Debug)]
pub struct ShardStore {
    indexer: ShardIndexer,
    shards: HashMap<ShardId, Shard>,
}

impl ShardStore {
    /// Create an empty store over the given coordinate mapping
    pub fn new(indexer: ShardIndexer) -> Self {
        Self {
            indexer,
            shards: HashMap::new(),
        }
    }

    /// The coordinate mapping this store was built with
    pub fn indexer(&self) -> &ShardIndexer {
        &self.indexer
    }

    /// Number of shard slots created so far
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The shard for `id`, created Absent if missing
    pub fn ensure(&mut self, id: ShardId) -> Result<&mut Shard> {
        if !self.indexer.validate_shard_id(id) {
            return Err(Error::InvalidShardId(id));
        }
        Ok(self.shards.entry(id).or_default())
    }

    /// Replace a shard's contents with an authoritative result
    ///
    /// The input may repeat times; the last occurrence wins and the result
    /// is stored sorted ascending. Points outside the shard's bucket are
    /// rejected before anything is committed, leaving prior state
    /// untouched. Marks the shard Present and returns the number of
    /// points committed.
    pub fn set_data(&mut self, id: ShardId, points: Vec<DataPoint>) -> Result<usize> {
        let range = self.indexer.range_for_shard_id(id)?;
        let normalized = normalize(points);
        if let Some(point) = normalized.iter().find(|p| !range.contains(p.time)) {
            return Err(Error::validation(format!(
                "point at time {} outside shard {}",
                point.time, range
            )));
        }
        let committed = normalized.len();
        self.ensure(id)?.commit(normalized);
        Ok(committed)
    }

    /// Insert or overwrite one point in the shard containing its time
    ///
    /// Creates the shard if needed and marks it Present. Returns the id
    /// of the shard that received the point.
    pub fn add_point(&mut self, point: DataPoint) -> Result<ShardId> {
        let id = self.indexer.shard_id_for_time(point.time)?;
        self.ensure(id)?.upsert(point);
        Ok(id)
    }

    /// The points cached for `id`, sorted ascending by time
    ///
    /// Absent and Pending shards read as empty; the store never
    /// fabricates data.
    pub fn get_data(&self, id: ShardId) -> Result<Vec<DataPoint>> {
        if !self.indexer.validate_shard_id(id) {
            return Err(Error::InvalidShardId(id));
        }
        Ok(self
            .shards
            .get(&id)
            .map(|shard| shard.points().to_vec())
            .unwrap_or_default())
    }

    /// Concatenated points for `ids`, in the given id order
    ///
    /// Repeated ids are not deduplicated; their points appear once per
    /// occurrence.
    pub fn get_data_for_ids(&self, ids: &[ShardId]) -> Result<Vec<DataPoint>> {
        let mut points = Vec::new();
        for &id in ids {
            points.extend(self.get_data(id)?);
        }
        Ok(points)
    }

    /// Cached points with `range.start <= time < range.end`, ascending
    pub fn get_data_for_range(&self, range: TimeRange) -> Result<Vec<DataPoint>> {
        let ids = self.indexer.shard_ids_for_range(range)?;
        let mut points = self.get_data_for_ids(&ids)?;
        points.retain(|p| range.contains(p.time));
        Ok(points)
    }

    /// True iff the shard holds an authoritative (possibly empty) result
    pub fn has_data(&self, id: ShardId) -> Result<bool> {
        self.state(id).map(|state| state == ShardState::Present)
    }

    /// True iff a fetch is outstanding for the shard
    pub fn is_pending(&self, id: ShardId) -> Result<bool> {
        self.state(id).map(|state| state == ShardState::Pending)
    }

    /// Check whether `id` is a non-negative multiple of the shard size
    pub fn validate_shard_id(&self, id: ShardId) -> bool {
        self.indexer.validate_shard_id(id)
    }

    /// Check whether `points` is a valid payload for shard `id`
    ///
    /// Every time must lie in the shard's bucket and no two points may
    /// share a time. Pure predicate: a bad id yields `false`, never an
    /// error.
    pub fn validate_shard_data(&self, id: ShardId, points: &[DataPoint]) -> bool {
        let range = match self.indexer.range_for_shard_id(id) {
            Ok(range) => range,
            Err(_) => return false,
        };
        if points.iter().any(|p| !range.contains(p.time)) {
            return false;
        }
        let mut times: Vec<_> = points.iter().map(|p| p.time).collect();
        times.sort_unstable();
        times.windows(2).all(|pair| pair[0] != pair[1])
    }

    /// Record that a fetch was dispatched for the shard
    pub(crate) fn mark_pending(&mut self, id: ShardId) -> Result<()> {
        self.ensure(id)?.mark_pending();
        Ok(())
    }

    /// Revert a failed fetch so a later one can be attempted
    pub(crate) fn mark_absent(&mut self, id: ShardId) -> Result<()> {
        self.ensure(id)?.mark_absent();
        Ok(())
    }

    fn state(&self, id: ShardId) -> Result<ShardState> {
        if !self.indexer.validate_shard_id(id) {
            return Err(Error::InvalidShardId(id));
        }
        Ok(self
            .shards
            .get(&id)
            .map(|shard| shard.state())
            .unwrap_or(ShardState::Absent))
    }
}

/// Deduplicate by time (last occurrence wins) and sort ascending
fn normalize(points: Vec<DataPoint>) -> Vec<DataPoint> {
    let mut by_time = BTreeMap::new();
    for point in points {
        by_time.insert(point.time, point);
    }
    by_time.into_values().collect()
}
