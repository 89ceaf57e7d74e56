//! Half-open time intervals
//!
//! Segments are announced for a half-open range `[start, end)` in nanoseconds
//! since the epoch. Intervals order by start boundary, then end boundary, which
//! is what lets the timeline keep them in an ordered search structure and
//! answer range queries without scanning unrelated state.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A half-open time range `[start, end)` in nanoseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    /// Inclusive start (nanoseconds)
    pub start: i64,
    /// Exclusive end (nanoseconds)
    pub end: i64,
}

impl Interval {
    /// Create a new interval. `start` must not exceed `end`.
    pub fn new(start: i64, end: i64) -> Self {
        debug_assert!(start <= end, "interval start {} > end {}", start, end);
        Self { start, end }
    }

    /// Interval between two UTC instants.
    pub fn utc(start: DateTime<chrono::Utc>, end: DateTime<chrono::Utc>) -> Self {
        Self::new(
            start.timestamp_nanos_opt().unwrap_or(i64::MIN),
            end.timestamp_nanos_opt().unwrap_or(i64::MAX),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn duration_nanos(&self) -> i64 {
        self.end - self.start
    }

    /// Whether a point in time falls inside this interval.
    pub fn contains_point(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Whether `other` lies entirely inside this interval.
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether the two intervals share any point. Empty intervals overlap nothing.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether the two intervals touch without overlapping.
    pub fn abuts(&self, other: &Interval) -> bool {
        self.end == other.start || other.end == self.start
    }

    /// The overlapping portion of the two intervals, if any.
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Interval::new(
            self.start.max(other.start),
            self.end.min(other.end),
        ))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            format_boundary(self.start),
            format_boundary(self.end)
        )
    }
}

impl FromStr for Interval {
    type Err = Error;

    /// Parse `"<start>/<end>"` where each boundary is either a date
    /// (`2011-04-01`, midnight UTC) or an RFC 3339 timestamp.
    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s
            .split_once('/')
            .ok_or_else(|| Error::Config(format!("invalid interval: {}", s)))?;
        let start = parse_boundary(start)?;
        let end = parse_boundary(end)?;
        if start > end {
            return Err(Error::Config(format!("interval start after end: {}", s)));
        }
        Ok(Interval { start, end })
    }
}

fn parse_boundary(s: &str) -> Result<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt
            .timestamp_nanos_opt()
            .ok_or_else(|| Error::Config(format!("timestamp out of range: {}", s)));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::Config(format!("invalid interval boundary {}: {}", s, e)))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .and_then(|dt| dt.timestamp_nanos_opt())
        .ok_or_else(|| Error::Config(format!("timestamp out of range: {}", s)))
}

fn format_boundary(nanos: i64) -> String {
    let dt = DateTime::from_timestamp_nanos(nanos);
    if nanos % 86_400_000_000_000 == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.to_rfc3339()
    }
}
