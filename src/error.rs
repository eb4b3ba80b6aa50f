//! Error handling for shardcache
//!
//! This module provides error types and a result alias for cache operations.
//! Invalid-argument errors are raised synchronously at the call boundary;
//! fetch failures travel back through the completion that reported them.

use thiserror::Error;

use crate::point::Time;
use crate::shard::ShardId;

/// Errors that can occur in cache operations
#[derive(Error, Debug)]
pub enum Error {
    /// A time coordinate outside the supported axis (negative)
    #[error("Invalid time: {0}")]
    InvalidTime(Time),

    /// A malformed half-open range (start >= end)
    #[error("Invalid range: [{start}, {end})")]
    InvalidRange {
        start: Time,
        end: Time,
    },

    /// A shard id that is negative or not a multiple of the shard size
    #[error("Invalid shard id: {0}")]
    InvalidShardId(ShardId),

    /// A tier index outside the configured tier list
    #[error("Invalid tier: {0}")]
    InvalidTier(usize),

    /// A payload rejected before commit (out-of-shard or duplicate times)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A fetch that resolved with a failure
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Errors related to configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new fetch error
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new malformed-range error
    pub fn invalid_range(start: Time, end: Time) -> Self {
        Self::InvalidRange { start, end }
    }

    /// Check if this is an invalid-argument error (time, range, shard id, tier)
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidTime(_)
                | Self::InvalidRange { .. }
                | Self::InvalidShardId(_)
                | Self::InvalidTier(_)
        )
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a fetch error
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}
