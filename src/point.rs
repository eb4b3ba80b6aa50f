//! Data points and time ranges
//!
//! The cache indexes plain `{time, value}` pairs on a signed millisecond
//! axis. Ranges are always half-open: `[start, end)`.

use serde::{Deserialize, Serialize};

/// A coordinate on the time axis, in milliseconds
pub type Time = i64;

/// A single cached observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Position on the time axis; unique within a shard
    pub time: Time,
    /// The observed value
    pub value: f64,
}

impl DataPoint {
    /// Create a new data point
    pub fn new(time: Time, value: f64) -> Self {
        Self { time, value }
    }
}

/// A half-open interval `[start, end)` over the time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive lower bound
    pub start: Time,
    /// Exclusive upper bound
    pub end: Time,
}

impl TimeRange {
    /// Create a new range; bounds are not checked here
    pub fn new(start: Time, end: Time) -> Self {
        Self { start, end }
    }

    /// Check whether a time falls inside the range
    pub fn contains(&self, time: Time) -> bool {
        self.start <= time && time < self.end
    }

    /// Width of the range
    pub fn len(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }

    /// Check whether the range covers nothing
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl From<(Time, Time)> for TimeRange {
    fn from((start, end): (Time, Time)) -> Self {
        Self::new(start, end)
    }
}
