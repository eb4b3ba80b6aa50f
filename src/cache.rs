//! The shard-cache engine
//!
//! `ShardCache` composes the coordinate mapping, the shard store and the
//! pending-request tracker behind one facade, and orchestrates fetches
//! through a caller-supplied [`FetchSource`]. Dispatch is fire-and-forget:
//! the source receives a consume-once [`FetchCompletion`] and resolves it
//! at any later time, from any thread. A shard with a fetch outstanding is
//! never dispatched again (coalescing), and reads of such a shard observe
//! "no data yet" rather than blocking.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::indexer::ShardIndexer;
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::pending::PendingRequestTracker;
use crate::point::{DataPoint, TimeRange};
use crate::shard::ShardId;
use crate::store::ShardStore;

/// The backing source the cache fetches from
///
/// Supplied at construction. `fetch` is invoked at most once per shard at
/// a time, with the exact range the shard covers; it must eventually
/// resolve or fail the completion (dropping it counts as a failure).
pub trait FetchSource: Send + Sync {
    /// Fetch the points for `range` and report through `completion`
    fn fetch(&self, range: TimeRange, completion: FetchCompletion);
}

impl<F> FetchSource for F
where
    F: Fn(TimeRange, FetchCompletion) + Send + Sync,
{
    fn fetch(&self, range: TimeRange, completion: FetchCompletion) {
        self(range, completion)
    }
}

/// Callback invoked after each fetch resolves
///
/// Receives the shard id and either the number of points committed or the
/// error that reverted the shard. Runs outside the cache's lock, so it may
/// call back into the cache.
pub type FetchObserver =
    Box<dyn Fn(ShardId, std::result::Result<usize, &Error>) + Send + Sync>;

/// Mutable state shared with outstanding completions
struct Inner {
    store: ShardStore,
    pending: PendingRequestTracker,
}

struct Shared {
    indexer: ShardIndexer,
    inner: Mutex<Inner>,
    metrics: MetricsCollector,
    observer: Option<FetchObserver>,
}

impl Shared {
    /// Commit a successful fetch: set data, then clear pending
    fn commit(&self, id: ShardId, points: Vec<DataPoint>) -> Result<()> {
        let outcome = {
            let mut inner = self.inner.lock();
            let outcome = inner.store.set_data(id, points);
            inner.pending.clear_pending(id);
            if outcome.is_err() {
                // An invalid payload is a failed fetch: revert so a later
                // attempt can retry. Present shards are unaffected since
                // only Pending shards have outstanding completions.
                inner.store.mark_absent(id).ok();
            }
            outcome
        };
        match outcome {
            Ok(committed) => {
                self.metrics.increment_completed();
                self.metrics.add_points_inserted(committed);
                debug!(shard_id = id, points = committed, "fetch committed");
                self.notify(id, Ok(committed));
                Ok(())
            }
            Err(err) => {
                self.metrics.increment_failed();
                warn!(shard_id = id, error = %err, "fetch payload rejected");
                self.notify(id, Err(&err));
                Err(err)
            }
        }
    }

    /// Abort a failed fetch: clear pending, revert the shard to Absent
    fn abort(&self, id: ShardId, err: &Error) {
        {
            let mut inner = self.inner.lock();
            inner.pending.clear_pending(id);
            inner.store.mark_absent(id).ok();
        }
        self.metrics.increment_failed();
        warn!(shard_id = id, error = %err, "fetch failed");
        self.notify(id, Err(err));
    }

    fn notify(&self, id: ShardId, outcome: std::result::Result<usize, &Error>) {
        if let Some(observer) = &self.observer {
            observer(id, outcome);
        }
    }
}

/// Consume-once handle through which a fetch reports its result
///
/// Exactly one of [`resolve`](Self::resolve) or [`fail`](Self::fail) must
/// be called. Dropping an unresolved completion reverts its shard to
/// Absent so an aborted fetch source cannot leave the shard Pending
/// forever.
pub struct FetchCompletion {
    shared: Arc<Shared>,
    id: ShardId,
    resolved: bool,
}

impl FetchCompletion {
    /// The shard this completion belongs to
    pub fn shard_id(&self) -> ShardId {
        self.id
    }

    /// The range the fetch was asked to cover
    pub fn range(&self) -> TimeRange {
        // The id came from the indexer, so this cannot fail.
        TimeRange::new(self.id, self.id + self.shared.indexer.shard_size())
    }

    /// Report a successful fetch
    ///
    /// Commits `points` to the shard (deduplicated by time, last wins,
    /// sorted ascending) and clears the pending mark. Fails with a
    /// validation error if any point falls outside the shard or if the
    /// deduplicated payload still collides by time; the shard then
    /// reverts to Absent.
    pub fn resolve(mut self, points: Vec<DataPoint>) -> Result<()> {
        self.resolved = true;
        self.shared.commit(self.id, points)
    }

    /// Report a failed fetch
    ///
    /// Clears the pending mark and reverts the shard to Absent; the error
    /// is surfaced back to the caller. The cache never retries on its own.
    pub fn fail(mut self, reason: impl Into<String>) -> Error {
        self.resolved = true;
        let err = Error::fetch(reason);
        self.shared.abort(self.id, &err);
        err
    }

    /// Report either outcome of a fetch
    pub fn complete(
        self,
        result: std::result::Result<Vec<DataPoint>, String>,
    ) -> Result<()> {
        match result {
            Ok(points) => self.resolve(points),
            Err(reason) => Err(self.fail(reason)),
        }
    }
}

impl Drop for FetchCompletion {
    fn drop(&mut self) {
        if !self.resolved {
            let err = Error::fetch("fetch dropped without resolution");
            warn!(shard_id = self.id, "completion dropped without resolution");
            self.shared.abort(self.id, &err);
        }
    }
}

/// In-process cache of time-indexed points over fixed-width shards
///
/// One instance covers one shard size and one fetch source. Multiple
/// independently configured instances compose into a
/// [`TieredShardCache`](crate::tiered::TieredShardCache).
pub struct ShardCache {
    shared: Arc<Shared>,
    source: Arc<dyn FetchSource>,
}

impl ShardCache {
    /// Create a cache over `source` with the given configuration
    pub fn new(config: CacheConfig, source: impl FetchSource + 'static) -> Result<Self> {
        Self::build(config, Arc::new(source), None)
    }

    /// Create a cache that also notifies `observer` as fetches resolve
    pub fn with_observer(
        config: CacheConfig,
        source: impl FetchSource + 'static,
        observer: FetchObserver,
    ) -> Result<Self> {
        Self::build(config, Arc::new(source), Some(observer))
    }

    fn build(
        config: CacheConfig,
        source: Arc<dyn FetchSource>,
        observer: Option<FetchObserver>,
    ) -> Result<Self> {
        config.validate()?;
        let indexer = ShardIndexer::new(config.shard_size);
        let shared = Arc::new(Shared {
            indexer,
            inner: Mutex::new(Inner {
                store: ShardStore::new(indexer),
                pending: PendingRequestTracker::new(),
            }),
            metrics: MetricsCollector::new(),
            observer,
        });
        Ok(Self { shared, source })
    }

    /// Width of each shard on the time axis
    pub fn shard_size(&self) -> i64 {
        self.shared.indexer.shard_size()
    }

    // fetch

    /// Dispatch a fetch for one shard, unless it is Present or Pending
    ///
    /// Fire-and-forget: completion happens whenever the fetch source
    /// resolves. Fails fast on an invalid id with no effect.
    pub fn fetch_shard(&self, id: ShardId) -> Result<()> {
        let range = self.shared.indexer.range_for_shard_id(id)?;
        {
            let mut inner = self.shared.inner.lock();
            if inner.store.has_data(id)? || inner.pending.is_pending(id) {
                self.shared.metrics.increment_coalesced();
                return Ok(());
            }
            inner.pending.mark_pending(id);
            inner.store.mark_pending(id)?;
        }
        self.shared.metrics.increment_dispatched();
        debug!(shard_id = id, %range, "dispatching fetch");
        let completion = FetchCompletion {
            shared: Arc::clone(&self.shared),
            id,
            resolved: false,
        };
        self.source.fetch(range, completion);
        Ok(())
    }

    /// Dispatch fetches for every listed shard not already Present or Pending
    ///
    /// All ids are validated before anything is dispatched.
    pub fn fetch_shards(&self, ids: &[ShardId]) -> Result<()> {
        if let Some(&bad) = ids.iter().find(|&&id| !self.validate_shard_id(id)) {
            return Err(Error::InvalidShardId(bad));
        }
        for &id in ids {
            self.fetch_shard(id)?;
        }
        Ok(())
    }

    /// Dispatch fetches for every shard intersecting `range` that is not
    /// already Present or Pending
    pub fn fetch_range(&self, range: TimeRange) -> Result<()> {
        let ids = self.shared.indexer.shard_ids_for_range(range)?;
        for id in ids {
            self.fetch_shard(id)?;
        }
        Ok(())
    }

    // set

    /// Replace a shard's contents directly (no fetch involved)
    ///
    /// Same normalization and validation as a fetch commit. Marks the
    /// shard Present; an outstanding fetch for the shard, if any, will
    /// still resolve and overwrite.
    pub fn set_data(&self, id: ShardId, points: Vec<DataPoint>) -> Result<()> {
        let committed = self.shared.inner.lock().store.set_data(id, points)?;
        self.shared.metrics.add_points_inserted(committed);
        Ok(())
    }

    // add

    /// Insert or overwrite one point in the shard containing its time
    ///
    /// Creates the shard if needed and marks it Present. Returns the id
    /// of the shard that received the point.
    pub fn add_point(&self, point: DataPoint) -> Result<ShardId> {
        let id = self.shared.inner.lock().store.add_point(point)?;
        self.shared.metrics.add_points_inserted(1);
        Ok(id)
    }

    // get

    /// The points cached for one shard, sorted ascending by time
    pub fn get_data(&self, id: ShardId) -> Result<Vec<DataPoint>> {
        self.shared.metrics.increment_reads();
        self.shared.inner.lock().store.get_data(id)
    }

    /// Concatenated points for `ids`, in the given order, repeats kept
    pub fn get_data_for_ids(&self, ids: &[ShardId]) -> Result<Vec<DataPoint>> {
        self.shared.metrics.increment_reads();
        self.shared.inner.lock().store.get_data_for_ids(ids)
    }

    /// Cached points within `range`, ascending by time
    pub fn get_data_for_range(&self, range: TimeRange) -> Result<Vec<DataPoint>> {
        self.shared.metrics.increment_reads();
        self.shared.inner.lock().store.get_data_for_range(range)
    }

    // compute

    /// The subsequence of `ids` that still needs data
    ///
    /// A shard counts as missing until its fetch actually resolves, so
    /// Pending shards are included.
    pub fn compute_missing_ids(&self, ids: &[ShardId]) -> Result<Vec<ShardId>> {
        let inner = self.shared.inner.lock();
        let mut missing = Vec::new();
        for &id in ids {
            if !inner.store.has_data(id)? {
                missing.push(id);
            }
        }
        Ok(missing)
    }

    /// Ids of shards intersecting `range` that still need data
    pub fn compute_missing_from_range(&self, range: TimeRange) -> Result<Vec<ShardId>> {
        let ids = self.shared.indexer.shard_ids_for_range(range)?;
        self.compute_missing_ids(&ids)
    }

    /// Ascending ids of every shard intersecting `range`
    pub fn shard_ids_for_range(&self, range: TimeRange) -> Result<Vec<ShardId>> {
        self.shared.indexer.shard_ids_for_range(range)
    }

    /// The half-open interval covered by a shard id
    pub fn range_for_shard_id(&self, id: ShardId) -> Result<TimeRange> {
        self.shared.indexer.range_for_shard_id(id)
    }

    // has

    /// True iff the shard holds an authoritative (possibly empty) result
    pub fn has_data(&self, id: ShardId) -> Result<bool> {
        self.shared.inner.lock().store.has_data(id)
    }

    /// True iff a fetch is outstanding for the shard
    pub fn is_pending(&self, id: ShardId) -> Result<bool> {
        self.shared.inner.lock().store.is_pending(id)
    }

    // validate

    /// Check whether `id` is a non-negative multiple of the shard size
    pub fn validate_shard_id(&self, id: ShardId) -> bool {
        self.shared.indexer.validate_shard_id(id)
    }

    /// Check whether `points` is a valid payload for shard `id`
    pub fn validate_shard_data(&self, id: ShardId, points: &[DataPoint]) -> bool {
        self.shared.inner.lock().store.validate_shard_data(id, points)
    }

    /// Point-in-time snapshot of the cache's counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Fetch source that parks completions until the test resolves them
    #[derive(Clone, Default)]
    struct ManualSource {
        calls: Arc<Mutex<VecDeque<(TimeRange, FetchCompletion)>>>,
    }

    impl ManualSource {
        fn pop(&self) -> (TimeRange, FetchCompletion) {
            self.calls.lock().pop_front().expect("no fetch dispatched")
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl FetchSource for ManualSource {
        fn fetch(&self, range: TimeRange, completion: FetchCompletion) {
            self.calls.lock().push_back((range, completion));
        }
    }

    fn cache_with_source() -> (ShardCache, ManualSource) {
        let source = ManualSource::default();
        let cache = ShardCache::new(
            CacheConfig::new().with_shard_size(60000),
            source.clone(),
        )
        .unwrap();
        (cache, source)
    }

    fn pt(time: i64, value: f64) -> DataPoint {
        DataPoint::new(time, value)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = ShardCache::new(
            CacheConfig::new().with_shard_size(0),
            |_range: TimeRange, _completion: FetchCompletion| {},
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_fetch_shard_dispatches_covered_range() {
        let (cache, source) = cache_with_source();
        cache.fetch_shard(60000).unwrap();

        let (range, completion) = source.pop();
        assert_eq!(range, TimeRange::new(60000, 120000));
        assert_eq!(completion.shard_id(), 60000);
        assert_eq!(completion.range(), range);
        assert!(cache.is_pending(60000).unwrap());
        assert!(!cache.has_data(60000).unwrap());

        completion.resolve(vec![pt(60000, 1.0)]).unwrap();
        assert!(cache.has_data(60000).unwrap());
        assert!(!cache.is_pending(60000).unwrap());
        assert_eq!(cache.get_data(60000).unwrap(), vec![pt(60000, 1.0)]);
    }

    #[test]
    fn test_dispatch_is_coalesced_while_pending() {
        let (cache, source) = cache_with_source();
        cache.fetch_shard(0).unwrap();
        cache.fetch_shard(0).unwrap();
        cache.fetch_shard(0).unwrap();
        // Exactly one underlying fetch.
        assert_eq!(source.call_count(), 1);

        let (_, completion) = source.pop();
        completion.resolve(vec![]).unwrap();

        // Present shards are not refetched either.
        cache.fetch_shard(0).unwrap();
        assert_eq!(source.call_count(), 0);

        let snap = cache.metrics();
        assert_eq!(snap.fetches_dispatched, 1);
        assert_eq!(snap.fetches_coalesced, 3);
        assert_eq!(snap.fetches_completed, 1);
    }

    #[test]
    fn test_fetch_shard_rejects_invalid_id() {
        let (cache, source) = cache_with_source();
        assert!(cache.fetch_shard(61).is_err());
        assert!(cache.fetch_shard(-60000).is_err());
        assert_eq!(source.call_count(), 0);
    }

    #[test]
    fn test_fetch_range_skips_present_and_pending() {
        let (cache, source) = cache_with_source();
        cache.set_data(0, vec![pt(5, 5.0)]).unwrap();
        cache.fetch_shard(60000).unwrap();

        cache.fetch_range(TimeRange::new(0, 180001)).unwrap();
        // 0 is Present, 60000 is Pending; only 120000 and 180000 were
        // newly dispatched on top of the earlier 60000 fetch.
        assert_eq!(source.call_count(), 3);
        let (range, _c1) = source.pop();
        assert_eq!(range.start, 60000);
        let (range, _c2) = source.pop();
        assert_eq!(range.start, 120000);
        let (range, _c3) = source.pop();
        assert_eq!(range.start, 180000);
    }

    #[test]
    fn test_fetch_shards_validates_all_before_dispatch() {
        let (cache, source) = cache_with_source();
        let err = cache.fetch_shards(&[0, 60000, 7]).unwrap_err();
        assert!(matches!(err, Error::InvalidShardId(7)));
        assert_eq!(source.call_count(), 0);

        cache.fetch_shards(&[0, 60000]).unwrap();
        assert_eq!(source.call_count(), 2);
    }

    #[test]
    fn test_failed_fetch_reverts_to_absent_for_retry() {
        let (cache, source) = cache_with_source();
        cache.fetch_shard(0).unwrap();

        let (_, completion) = source.pop();
        let err = completion.fail("backing store unreachable");
        assert!(err.is_fetch());

        assert!(!cache.has_data(0).unwrap());
        assert!(!cache.is_pending(0).unwrap());
        assert_eq!(cache.metrics().fetches_failed, 1);

        // The shard can be fetched again.
        cache.fetch_shard(0).unwrap();
        assert_eq!(source.call_count(), 1);
    }

    #[test]
    fn test_invalid_payload_counts_as_failed_fetch() {
        let (cache, source) = cache_with_source();
        cache.fetch_shard(0).unwrap();

        let (_, completion) = source.pop();
        // Point outside [0, 60000).
        let err = completion.resolve(vec![pt(60000, 1.0)]).unwrap_err();
        assert!(err.is_validation());

        assert!(!cache.has_data(0).unwrap());
        assert!(!cache.is_pending(0).unwrap());
        assert_eq!(cache.metrics().fetches_failed, 1);
    }

    #[test]
    fn test_dropped_completion_reverts_to_absent() {
        let (cache, source) = cache_with_source();
        cache.fetch_shard(0).unwrap();

        let (_, completion) = source.pop();
        drop(completion);

        assert!(!cache.is_pending(0).unwrap());
        assert!(!cache.has_data(0).unwrap());
        cache.fetch_shard(0).unwrap();
        assert_eq!(source.call_count(), 1);
    }

    #[test]
    fn test_complete_routes_both_outcomes() {
        let (cache, source) = cache_with_source();
        cache.fetch_shard(0).unwrap();
        let (_, completion) = source.pop();
        completion.complete(Ok(vec![pt(1, 1.0)])).unwrap();
        assert!(cache.has_data(0).unwrap());

        cache.fetch_shard(60000).unwrap();
        let (_, completion) = source.pop();
        let err = completion.complete(Err("boom".into())).unwrap_err();
        assert!(err.is_fetch());
        assert!(!cache.has_data(60000).unwrap());
    }

    #[test]
    fn test_pending_counts_as_missing() {
        let (cache, source) = cache_with_source();
        cache.fetch_shard(0).unwrap();

        let missing = cache
            .compute_missing_from_range(TimeRange::new(0, 120001))
            .unwrap();
        assert_eq!(missing, vec![0, 60000, 120000]);

        let (_, completion) = source.pop();
        completion.resolve(vec![]).unwrap();

        let missing = cache
            .compute_missing_from_range(TimeRange::new(0, 120001))
            .unwrap();
        assert_eq!(missing, vec![60000, 120000]);
    }

    #[test]
    fn test_compute_missing_ids_validates() {
        let (cache, _source) = cache_with_source();
        assert!(cache.compute_missing_ids(&[0, 3]).is_err());
        assert_eq!(cache.compute_missing_ids(&[]).unwrap(), Vec::<ShardId>::new());
    }

    #[test]
    fn test_observer_sees_both_outcomes() {
        let seen: Arc<Mutex<Vec<(ShardId, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_by_observer = Arc::clone(&seen);
        let source = ManualSource::default();
        let cache = ShardCache::with_observer(
            CacheConfig::new().with_shard_size(60000),
            source.clone(),
            Box::new(
                move |id: ShardId, outcome: std::result::Result<usize, &Error>| {
                    seen_by_observer.lock().push((id, outcome.is_ok()));
                },
            ),
        )
        .unwrap();

        cache.fetch_shard(0).unwrap();
        cache.fetch_shard(60000).unwrap();

        let (_, completion) = source.pop();
        completion.resolve(vec![pt(1, 1.0)]).unwrap();
        let (_, completion) = source.pop();
        let _ = completion.fail("unreachable");

        assert_eq!(*seen.lock(), vec![(0, true), (60000, false)]);
    }

    #[test]
    fn test_direct_writes_do_not_disturb_outstanding_fetch() {
        let (cache, source) = cache_with_source();
        cache.fetch_shard(0).unwrap();

        // A direct write lands while the fetch is in flight.
        cache.add_point(pt(10, 1.0)).unwrap();
        assert!(cache.has_data(0).unwrap());

        // The fetch still resolves and overwrites with its result.
        let (_, completion) = source.pop();
        completion.resolve(vec![pt(20, 2.0)]).unwrap();
        assert_eq!(cache.get_data(0).unwrap(), vec![pt(20, 2.0)]);
    }

    #[test]
    fn test_closure_fetch_source() {
        let cache = ShardCache::new(
            CacheConfig::new().with_shard_size(1000),
            |range: TimeRange, completion: FetchCompletion| {
                // Resolve inline with one point per bucket edge.
                completion
                    .resolve(vec![
                        pt(range.start, range.start as f64),
                        pt(range.end - 1, (range.end - 1) as f64),
                    ])
                    .unwrap();
            },
        )
        .unwrap();

        cache.fetch_shard(0).unwrap();
        assert_eq!(
            cache.get_data(0).unwrap(),
            vec![pt(0, 0.0), pt(999, 999.0)]
        );
    }
}
