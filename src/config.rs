//! Configuration for shardcache
//!
//! This module provides configuration options for a single cache instance
//! and for the tiered dispatcher that composes several of them.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default shard width on the time axis (one minute in milliseconds)
pub const DEFAULT_SHARD_SIZE: i64 = 60_000;

/// Configuration options for one cache instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct CacheConfig {
    /// Width of each shard on the time axis; must be positive
    pub shard_size: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shard_size: DEFAULT_SHARD_SIZE,
        }
    }
}

impl CacheConfig {
    /// Create a configuration with the default shard size
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shard size
    pub fn with_shard_size(mut self, shard_size: i64) -> Self {
        self.shard_size = shard_size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.shard_size <= 0 {
            return Err(Error::config(format!(
                "shard_size must be positive, got {}",
                self.shard_size
            )));
        }
        Ok(())
    }
}

/// Configuration for a tiered cache: one shard size per tier
///
/// Tier indices are positions in this list; each tier becomes an
/// independent cache instance with its own shards and pending set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Shard sizes, one per tier, coarsest to finest or any order the
    /// embedding application prefers
    pub shard_sizes: Vec<i64>,
}

impl TierConfig {
    /// Create a tier configuration from a list of shard sizes
    pub fn new(shard_sizes: impl Into<Vec<i64>>) -> Self {
        Self {
            shard_sizes: shard_sizes.into(),
        }
    }

    /// Number of tiers
    pub fn tier_count(&self) -> usize {
        self.shard_sizes.len()
    }

    /// Validate the configuration: at least one tier, every size positive
    pub fn validate(&self) -> Result<()> {
        if self.shard_sizes.is_empty() {
            return Err(Error::config("tier list must not be empty"));
        }
        for (tier, &size) in self.shard_sizes.iter().enumerate() {
            if size <= 0 {
                return Err(Error::config(format!(
                    "shard_size for tier {} must be positive, got {}",
                    tier, size
                )));
            }
        }
        Ok(())
    }

    /// Per-tier cache configurations, in tier order
    pub fn cache_configs(&self) -> impl Iterator<Item = CacheConfig> + '_ {
        self.shard_sizes
            .iter()
            .map(|&shard_size| CacheConfig::new().with_shard_size(shard_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CacheConfig::default();
        assert_eq!(config.shard_size, DEFAULT_SHARD_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_non_positive_shard_size() {
        assert!(CacheConfig::new().with_shard_size(0).validate().is_err());
        assert!(CacheConfig::new().with_shard_size(-60000).validate().is_err());
        assert!(CacheConfig::new().with_shard_size(1).validate().is_ok());
    }

    #[test]
    fn test_tier_config_validation() {
        assert!(TierConfig::new(vec![]).validate().is_err());
        assert!(TierConfig::new(vec![60000, 0]).validate().is_err());

        let tiers = TierConfig::new(vec![60000, 3_600_000]);
        assert!(tiers.validate().is_ok());
        assert_eq!(tiers.tier_count(), 2);

        let configs: Vec<_> = tiers.cache_configs().collect();
        assert_eq!(configs[0].shard_size, 60000);
        assert_eq!(configs[1].shard_size, 3_600_000);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = CacheConfig::new().with_shard_size(1000);
        let json = serde_json::to_string(&config).unwrap();
        let back: CacheConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
