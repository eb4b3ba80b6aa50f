//! In-process cache for time-indexed data points
//!
//! The time axis is partitioned into fixed-width buckets ("shards"), each
//! identified by its start time. The cache tracks which buckets hold
//! authoritative data, coalesces concurrent fetch requests so at most one
//! fetch is ever in flight per bucket, and answers range queries by
//! combining bucket contents. Fetching is delegated to a caller-supplied
//! [`FetchSource`] that resolves asynchronously through a consume-once
//! [`FetchCompletion`]; the cache itself never blocks, retries or evicts.
//!
//! [`ShardCache`] is a single instance with one shard size;
//! [`TieredShardCache`] composes several independent instances selected
//! by tier index.
//!
//! ```
//! use shardcache::{CacheConfig, DataPoint, ShardCache, TimeRange};
//!
//! let cache = ShardCache::new(
//!     CacheConfig::new().with_shard_size(60_000),
//!     |range: TimeRange, completion: shardcache::FetchCompletion| {
//!         // A real source would resolve later, from wherever the data
//!         // lives; here we answer inline.
//!         let _ = completion.resolve(vec![DataPoint::new(range.start, 1.0)]);
//!     },
//! )
//! .unwrap();
//!
//! cache.fetch_range(TimeRange::new(0, 120_001)).unwrap();
//! let points = cache.get_data_for_range(TimeRange::new(0, 180_000)).unwrap();
//! assert_eq!(points.len(), 3);
//! ```

mod cache;
mod config;
mod error;
mod indexer;
mod metrics;
mod pending;
mod point;
mod shard;
mod store;
mod tiered;

pub use cache::{FetchCompletion, FetchObserver, FetchSource, ShardCache};
pub use config::{CacheConfig, TierConfig, DEFAULT_SHARD_SIZE};
pub use error::{Error, Result};
pub use indexer::ShardIndexer;
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use pending::PendingRequestTracker;
pub use point::{DataPoint, Time, TimeRange};
pub use shard::{Shard, ShardId, ShardState};
pub use store::ShardStore;
pub use tiered::{TieredFetchObserver, TieredFetchSource, TieredShardCache};
