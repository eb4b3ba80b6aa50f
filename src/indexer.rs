//! Shard coordinate arithmetic
//!
//! Maps times and ranges to shard ids and back. A shard id is the start
//! time of its bucket, so it is always a non-negative multiple of the
//! shard size and identifies the half-open interval
//! `[id, id + shard_size)`.

use crate::error::{Error, Result};
use crate::point::{Time, TimeRange};
use crate::shard::ShardId;

/// Pure time-to-shard coordinate mapping for one shard size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardIndexer {
    shard_size: i64,
}

impl ShardIndexer {
    /// Create an indexer for the given shard size
    ///
    /// The size is assumed positive; `CacheConfig::validate` enforces
    /// that before an indexer is ever constructed.
    pub fn new(shard_size: i64) -> Self {
        debug_assert!(shard_size > 0);
        Self { shard_size }
    }

    /// Width of each shard on the time axis
    pub fn shard_size(&self) -> i64 {
        self.shard_size
    }

    /// Id of the shard containing `time`
    pub fn shard_id_for_time(&self, time: Time) -> Result<ShardId> {
        if time < 0 {
            return Err(Error::InvalidTime(time));
        }
        Ok(time / self.shard_size * self.shard_size)
    }

    /// The half-open interval covered by a shard id
    pub fn range_for_shard_id(&self, id: ShardId) -> Result<TimeRange> {
        if !self.validate_shard_id(id) {
            return Err(Error::InvalidShardId(id));
        }
        Ok(TimeRange::new(id, id + self.shard_size))
    }

    /// Ascending ids of every shard intersecting `range`
    pub fn shard_ids_for_range(&self, range: TimeRange) -> Result<Vec<ShardId>> {
        if range.start >= range.end {
            return Err(Error::invalid_range(range.start, range.end));
        }
        let first = self.shard_id_for_time(range.start)?;
        // The last covered bucket is the one containing end - 1, since
        // the range excludes end itself.
        let stop = self.shard_id_for_time(range.end - 1)? + self.shard_size;
        let mut ids = Vec::with_capacity(((stop - first) / self.shard_size) as usize);
        let mut id = first;
        while id < stop {
            ids.push(id);
            id += self.shard_size;
        }
        Ok(ids)
    }

    /// Check whether `id` is a non-negative multiple of the shard size
    ///
    /// Pure predicate; never errors.
    pub fn validate_shard_id(&self, id: ShardId) -> bool {
        id >= 0 && id % self.shard_size == 0
    }
}
