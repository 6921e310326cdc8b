//! Core data models for the index-slicer crate

use crate::error::{Result, SlicerError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Sort direction for extreme-value probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

/// Smallest addressable time delta on the date axis
///
/// Bisection below one unit of the resolution is illegal and terminates
/// window reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeResolution {
    #[serde(rename = "s")]
    #[default]
    Seconds,
    #[serde(rename = "ms")]
    Milliseconds,
}

impl TimeResolution {
    /// One unit of this resolution as a duration
    pub fn unit(&self) -> Duration {
        match self {
            TimeResolution::Seconds => Duration::seconds(1),
            TimeResolution::Milliseconds => Duration::milliseconds(1),
        }
    }

    /// Drop any sub-resolution precision from a timestamp
    pub fn truncate(&self, dt: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeResolution::Seconds => {
                DateTime::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
            }
            TimeResolution::Milliseconds => {
                DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or(dt)
            }
        }
    }

    /// Format a timestamp at this resolution's precision
    ///
    /// Seconds: `2016-06-29T12:44:57+00:00`
    /// Milliseconds: `2016-01-19T13:33:09.356+00:00`
    pub fn format(&self, dt: DateTime<Utc>) -> String {
        match self {
            TimeResolution::Seconds => dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            TimeResolution::Milliseconds => dt.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string(),
        }
    }

    /// Number of whole resolution units between two timestamps
    pub fn units_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        let span = end.signed_duration_since(start);
        match self {
            TimeResolution::Seconds => span.num_seconds(),
            TimeResolution::Milliseconds => span.num_milliseconds(),
        }
    }

    /// Advance a timestamp by `n` resolution units
    pub fn add_units(&self, dt: DateTime<Utc>, n: i64) -> DateTime<Utc> {
        match self {
            TimeResolution::Seconds => dt + Duration::seconds(n),
            TimeResolution::Milliseconds => dt + Duration::milliseconds(n),
        }
    }
}

/// An end-exclusive time window at a fixed resolution
///
/// Invariant: `start < end`. The window describes documents with
/// `start <= timestamp < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub resolution: TimeResolution,
}

impl DateRange {
    /// Create a new DateRange
    ///
    /// # Returns
    /// * `Ok(DateRange)` if `start < end`
    /// * `Err(SlicerError)` otherwise
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resolution: TimeResolution,
    ) -> Result<Self> {
        if start >= end {
            return Err(SlicerError::InvalidRange(format!(
                "start ({}) must be before end ({})",
                resolution.format(start),
                resolution.format(end)
            )));
        }
        Ok(DateRange {
            start,
            end,
            resolution,
        })
    }

    /// Width of the window in resolution units
    pub fn width_units(&self) -> i64 {
        self.resolution.units_between(self.start, self.end)
    }

    /// Start bound formatted at the window's resolution
    pub fn formatted_start(&self) -> String {
        self.resolution.format(self.start)
    }

    /// End bound formatted at the window's resolution
    pub fn formatted_end(&self) -> String {
        self.resolution.format(self.end)
    }
}

/// The unit of slicer output: a bounded query descriptor guaranteed
/// (ceiling permitting) to match at most the configured number of documents
///
/// A pure date slice carries `start`/`end`; a key-subsliced date slice adds
/// `key`; a pure key-space slice carries only `count` and `key`.
///
/// A `Slice` doubles as the resume checkpoint: persisting the last emitted
/// slice lets a restarted cursor continue at the next window or key prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    /// Window start (inclusive); absent in pure key-space slices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,

    /// Window end (exclusive); absent in pure key-space slices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,

    /// Matching document count at probe time
    pub count: u64,

    /// Prefix-match expression layered on top of the time bounds,
    /// e.g. `events-#a*`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Slice {
    /// A pure date slice
    pub fn dated(start: DateTime<Utc>, end: DateTime<Utc>, count: u64) -> Self {
        Slice {
            start: Some(start),
            end: Some(end),
            count,
            key: None,
        }
    }

    /// A pure key-space slice (id-reader mode)
    pub fn keyed(count: u64, key: String) -> Self {
        Slice {
            start: None,
            end: None,
            count,
            key: Some(key),
        }
    }

    /// A key slice scoped to a date window (subslice-by-key output)
    pub fn keyed_window(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        count: u64,
        key: String,
    ) -> Self {
        Slice {
            start: Some(start),
            end: Some(end),
            count,
            key: Some(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_date_range_requires_start_before_end() {
        assert!(DateRange::new(ts(100), ts(200), TimeResolution::Seconds).is_ok());
        assert!(DateRange::new(ts(200), ts(100), TimeResolution::Seconds).is_err());
        assert!(DateRange::new(ts(100), ts(100), TimeResolution::Seconds).is_err());
    }

    #[test]
    fn test_width_units() {
        let range = DateRange::new(ts(100), ts(160), TimeResolution::Seconds).unwrap();
        assert_eq!(range.width_units(), 60);

        let range = DateRange::new(ts(100), ts(101), TimeResolution::Milliseconds).unwrap();
        assert_eq!(range.width_units(), 1000);
    }

    #[test]
    fn test_resolution_truncate() {
        let dt = Utc.timestamp_millis_opt(1_500_000_123_456).unwrap();
        assert_eq!(
            TimeResolution::Seconds.truncate(dt).timestamp_millis(),
            1_500_000_123_000
        );
        assert_eq!(
            TimeResolution::Milliseconds.truncate(dt).timestamp_millis(),
            1_500_000_123_456
        );
    }

    #[test]
    fn test_resolution_format_precision() {
        let dt = Utc.timestamp_millis_opt(1_452_202_389_356).unwrap();
        let secs = TimeResolution::Seconds.format(dt);
        let millis = TimeResolution::Milliseconds.format(dt);

        assert!(!secs.contains('.'), "seconds format has no subseconds: {secs}");
        assert!(millis.contains(".356"), "ms format keeps millis: {millis}");
    }

    #[test]
    fn test_slice_checkpoint_round_trip() {
        let slice = Slice::keyed_window(ts(100), ts(101), 42, "events-#a*".to_string());
        let json = serde_json::to_string(&slice).unwrap();
        let back: Slice = serde_json::from_str(&json).unwrap();
        assert_eq!(back, slice);
    }

    #[test]
    fn test_pure_key_slice_omits_date_bounds() {
        let slice = Slice::keyed(100, "events-#a*".to_string());
        let json = serde_json::to_string(&slice).unwrap();
        assert!(!json.contains("start"));
        assert!(!json.contains("end"));
        assert!(json.contains("events-#a*"));
    }
}
