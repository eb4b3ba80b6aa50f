//! Tiered dispatcher
//!
//! Fans every operation out to one of N independently configured cache
//! instances ("tiers"), selected by index. Each tier has its own shard
//! size, its own shards and its own pending set; the dispatcher adds
//! nothing beyond a bounds check on the tier index.

use std::sync::Arc;

use crate::cache::{FetchCompletion, FetchSource, ShardCache};
use crate::config::TierConfig;
use crate::error::{Error, Result};
use crate::metrics::MetricsSnapshot;
use crate::point::{DataPoint, TimeRange};
use crate::shard::ShardId;

/// The backing source for a tiered cache
///
/// Like [`FetchSource`] but also told which tier the fetch is for, so one
/// source can serve differently sized buckets from different datasets.
pub trait TieredFetchSource: Send + Sync {
    /// Fetch the points for `range` on behalf of `tier`
    fn fetch(&self, range: TimeRange, tier: usize, completion: FetchCompletion);
}

impl<F> TieredFetchSource for F
where
    F: Fn(TimeRange, usize, FetchCompletion) + Send + Sync,
{
    fn fetch(&self, range: TimeRange, tier: usize, completion: FetchCompletion) {
        self(range, tier, completion)
    }
}

/// Callback invoked as fetches resolve on any tier
pub type TieredFetchObserver =
    Box<dyn Fn(usize, ShardId, std::result::Result<usize, &Error>) + Send + Sync>;

/// Adapter pinning one tier index onto the shared tiered source
struct TierSource {
    tier: usize,
    source: Arc<dyn TieredFetchSource>,
}

impl FetchSource for TierSource {
    fn fetch(&self, range: TimeRange, completion: FetchCompletion) {
        self.source.fetch(range, self.tier, completion)
    }
}

/// N independent shard caches selected by tier index
pub struct TieredShardCache {
    tiers: Vec<ShardCache>,
}

impl TieredShardCache {
    /// Create one cache instance per configured tier over `source`
    pub fn new(config: TierConfig, source: impl TieredFetchSource + 'static) -> Result<Self> {
        Self::build(config, Arc::new(source), None)
    }

    /// Create a tiered cache that also notifies `observer` as fetches resolve
    pub fn with_observer(
        config: TierConfig,
        source: impl TieredFetchSource + 'static,
        observer: TieredFetchObserver,
    ) -> Result<Self> {
        Self::build(config, Arc::new(source), Some(Arc::from(observer)))
    }

    fn build(
        config: TierConfig,
        source: Arc<dyn TieredFetchSource>,
        observer: Option<Arc<dyn Fn(usize, ShardId, std::result::Result<usize, &Error>) + Send + Sync>>,
    ) -> Result<Self> {
        config.validate()?;
        let mut tiers = Vec::with_capacity(config.tier_count());
        for (tier, cache_config) in config.cache_configs().enumerate() {
            let tier_source = TierSource {
                tier,
                source: Arc::clone(&source),
            };
            let cache = match &observer {
                Some(observer) => {
                    let observer = Arc::clone(observer);
                    ShardCache::with_observer(
                        cache_config,
                        tier_source,
                        Box::new(
                            move |id: ShardId, outcome: std::result::Result<usize, &Error>| {
                                observer(tier, id, outcome)
                            },
                        ),
                    )?
                }
                None => ShardCache::new(cache_config, tier_source)?,
            };
            tiers.push(cache);
        }
        Ok(Self { tiers })
    }

    /// Number of configured tiers
    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Check whether a tier index is in bounds
    pub fn validate_tier(&self, tier: usize) -> bool {
        tier < self.tiers.len()
    }

    fn tier(&self, tier: usize) -> Result<&ShardCache> {
        self.tiers.get(tier).ok_or(Error::InvalidTier(tier))
    }

    // fetch

    /// Dispatch a fetch for one shard on `tier`
    pub fn fetch_shard(&self, id: ShardId, tier: usize) -> Result<()> {
        self.tier(tier)?.fetch_shard(id)
    }

    /// Dispatch fetches for the listed shards on `tier`
    pub fn fetch_shards(&self, ids: &[ShardId], tier: usize) -> Result<()> {
        self.tier(tier)?.fetch_shards(ids)
    }

    /// Dispatch fetches for every missing shard intersecting `range` on `tier`
    pub fn fetch_range(&self, range: TimeRange, tier: usize) -> Result<()> {
        self.tier(tier)?.fetch_range(range)
    }

    // set

    /// Replace a shard's contents directly on `tier`
    pub fn set_data(&self, id: ShardId, tier: usize, points: Vec<DataPoint>) -> Result<()> {
        self.tier(tier)?.set_data(id, points)
    }

    // add

    /// Insert or overwrite one point on `tier`
    pub fn add_point(&self, point: DataPoint, tier: usize) -> Result<ShardId> {
        self.tier(tier)?.add_point(point)
    }

    // get

    /// The points cached for one shard on `tier`
    pub fn get_data(&self, id: ShardId, tier: usize) -> Result<Vec<DataPoint>> {
        self.tier(tier)?.get_data(id)
    }

    /// Concatenated points for `ids` on `tier`
    pub fn get_data_for_ids(&self, ids: &[ShardId], tier: usize) -> Result<Vec<DataPoint>> {
        self.tier(tier)?.get_data_for_ids(ids)
    }

    /// Cached points within `range` on `tier`
    pub fn get_data_for_range(&self, range: TimeRange, tier: usize) -> Result<Vec<DataPoint>> {
        self.tier(tier)?.get_data_for_range(range)
    }

    // compute

    /// The subsequence of `ids` still needing data on `tier`
    pub fn compute_missing_ids(&self, ids: &[ShardId], tier: usize) -> Result<Vec<ShardId>> {
        self.tier(tier)?.compute_missing_ids(ids)
    }

    /// Ids of shards intersecting `range` still needing data on `tier`
    pub fn compute_missing_from_range(
        &self,
        range: TimeRange,
        tier: usize,
    ) -> Result<Vec<ShardId>> {
        self.tier(tier)?.compute_missing_from_range(range)
    }

    /// Ascending ids of every shard intersecting `range` on `tier`
    pub fn shard_ids_for_range(&self, range: TimeRange, tier: usize) -> Result<Vec<ShardId>> {
        self.tier(tier)?.shard_ids_for_range(range)
    }

    /// The half-open interval covered by a shard id on `tier`
    pub fn range_for_shard_id(&self, id: ShardId, tier: usize) -> Result<TimeRange> {
        self.tier(tier)?.range_for_shard_id(id)
    }

    // has

    /// True iff the shard holds an authoritative result on `tier`
    pub fn has_data(&self, id: ShardId, tier: usize) -> Result<bool> {
        self.tier(tier)?.has_data(id)
    }

    /// True iff a fetch is outstanding for the shard on `tier`
    pub fn is_pending(&self, id: ShardId, tier: usize) -> Result<bool> {
        self.tier(tier)?.is_pending(id)
    }

    // validate

    /// Check a shard id against the shard size of `tier`
    pub fn validate_shard_id(&self, id: ShardId, tier: usize) -> Result<bool> {
        Ok(self.tier(tier)?.validate_shard_id(id))
    }

    /// Check a payload against shard `id` on `tier`
    pub fn validate_shard_data(
        &self,
        id: ShardId,
        tier: usize,
        points: &[DataPoint],
    ) -> Result<bool> {
        Ok(self.tier(tier)?.validate_shard_data(id, points))
    }

    /// Counter snapshot for one tier
    pub fn metrics(&self, tier: usize) -> Result<MetricsSnapshot> {
        Ok(self.tier(tier)?.metrics())
    }
}
