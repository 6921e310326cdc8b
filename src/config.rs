//! Configuration for slicer construction

use crate::error::{Result, SlicerError};
use crate::models::TimeResolution;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Identifier alphabet family used for key-space partitioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    #[default]
    Hexadecimal,
    Base64url,
}

/// Nominal time-window width before adaptive adjustment
///
/// Parsed from human-readable strings such as `2hrs`, `5m`, `12h` or
/// `250ms`. Unit letters are case sensitive: `m` is minutes, `M` is months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub amount: i64,
    pub unit: IntervalUnit,
}

/// Time unit accepted in an interval string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Years,
    Months,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

impl IntervalUnit {
    fn from_alias(alias: &str) -> Option<Self> {
        match alias {
            "year" | "years" | "y" => Some(IntervalUnit::Years),
            "months" | "month" | "mo" | "mos" | "M" => Some(IntervalUnit::Months),
            "weeks" | "week" | "wks" | "wk" | "w" => Some(IntervalUnit::Weeks),
            "days" | "day" | "d" => Some(IntervalUnit::Days),
            "hours" | "hour" | "hr" | "hrs" | "h" => Some(IntervalUnit::Hours),
            "minutes" | "minute" | "min" | "mins" | "m" => Some(IntervalUnit::Minutes),
            "seconds" | "second" | "s" => Some(IntervalUnit::Seconds),
            "milliseconds" | "millisecond" | "ms" => Some(IntervalUnit::Milliseconds),
            _ => None,
        }
    }

    fn canonical(&self) -> &'static str {
        match self {
            IntervalUnit::Years => "y",
            IntervalUnit::Months => "M",
            IntervalUnit::Weeks => "w",
            IntervalUnit::Days => "d",
            IntervalUnit::Hours => "h",
            IntervalUnit::Minutes => "m",
            IntervalUnit::Seconds => "s",
            IntervalUnit::Milliseconds => "ms",
        }
    }
}

impl Interval {
    pub fn new(amount: i64, unit: IntervalUnit) -> Self {
        Interval { amount, unit }
    }

    /// The interval as a concrete duration
    ///
    /// Months and years use fixed 30/365-day spans; the interval is a nominal
    /// window width and the adaptive probe loop corrects any drift.
    pub fn to_duration(&self) -> Duration {
        match self.unit {
            IntervalUnit::Years => Duration::days(365 * self.amount),
            IntervalUnit::Months => Duration::days(30 * self.amount),
            IntervalUnit::Weeks => Duration::weeks(self.amount),
            IntervalUnit::Days => Duration::days(self.amount),
            IntervalUnit::Hours => Duration::hours(self.amount),
            IntervalUnit::Minutes => Duration::minutes(self.amount),
            IntervalUnit::Seconds => Duration::seconds(self.amount),
            IntervalUnit::Milliseconds => Duration::milliseconds(self.amount),
        }
    }
}

impl FromStr for Interval {
    type Err = SlicerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(s.len());

        let (digits, alias) = s.split_at(split);
        let amount: i64 = digits.parse().map_err(|_| {
            SlicerError::ConfigError(format!("interval is malformed: {s}"))
        })?;
        let unit = IntervalUnit::from_alias(alias).ok_or_else(|| {
            SlicerError::ConfigError(
                "the time descriptor for the interval is malformed".to_string(),
            )
        })?;

        Ok(Interval { amount, unit })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.canonical())
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Configuration consumed by the slicers
///
/// Values only; schema-level wiring (CLI flags, job schemas) lives with the
/// caller. Invalid combinations are rejected eagerly by [`validate`], before
/// any cursor exists.
///
/// [`validate`]: SlicerConfig::validate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlicerConfig {
    /// Date field queried for time windows and bound discovery
    #[serde(default = "default_date_field")]
    pub date_field: String,

    /// Global window start; discovered from the index when absent
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,

    /// Global window end (exclusive); discovered from the index when absent
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    /// Nominal window width before adaptive adjustment
    pub interval: Interval,

    /// Document-count ceiling per slice (default: 5000)
    #[serde(default = "default_size")]
    pub size: u64,

    /// Smallest addressable time delta: seconds or milliseconds (default: s)
    #[serde(default)]
    pub time_resolution: TimeResolution,

    /// Free-text base filter applied to every probe
    #[serde(default)]
    pub query: Option<String>,

    /// Number of parallel cursors to create (default: 1)
    #[serde(default = "default_slicers")]
    pub slicers: usize,

    /// Fall back to key-prefix partitioning when a window cannot shrink
    /// below one resolution unit (default: false)
    #[serde(default)]
    pub subslice_by_key: bool,

    /// Count at which an irreducible window falls back to key subslicing,
    /// and at which a subslice prefix is expanded one depth further
    /// (default: 50000)
    #[serde(default = "default_subslice_key_threshold")]
    pub subslice_key_threshold: u64,

    /// Field whose values the key alphabet partitions (e.g. a document type);
    /// required when `subslice_by_key` is set and for id-reader mode
    #[serde(default)]
    pub key_field: Option<String>,

    /// Identifier alphabet (default: hexadecimal)
    #[serde(default)]
    pub key_type: KeyType,

    /// Restriction/reordering of the top-level alphabet symbols
    #[serde(default)]
    pub key_range: Option<Vec<char>>,

    /// Initial prefix length before the first count probe (default: 1)
    #[serde(default = "default_starting_key_depth")]
    pub starting_key_depth: usize,

    /// Probe retry budget per query identity (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

// Default value functions for serde
fn default_date_field() -> String {
    "@timestamp".to_string()
}

fn default_size() -> u64 {
    5000
}

fn default_slicers() -> usize {
    1
}

fn default_subslice_key_threshold() -> u64 {
    50000
}

fn default_starting_key_depth() -> usize {
    1
}

fn default_max_retries() -> usize {
    3
}

impl Default for SlicerConfig {
    fn default() -> Self {
        SlicerConfig {
            date_field: default_date_field(),
            start: None,
            end: None,
            interval: Interval::new(5, IntervalUnit::Minutes),
            size: default_size(),
            time_resolution: TimeResolution::default(),
            query: None,
            slicers: default_slicers(),
            subslice_by_key: false,
            subslice_key_threshold: default_subslice_key_threshold(),
            key_field: None,
            key_type: KeyType::default(),
            key_range: None,
            starting_key_depth: default_starting_key_depth(),
            max_retries: default_max_retries(),
        }
    }
}

impl SlicerConfig {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Returns
    /// * `Ok(SlicerConfig)` if loading and validation succeed
    /// * `Err(SlicerError)` if the file cannot be read or the config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            SlicerError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: SlicerConfig = serde_yaml::from_str(&content).map_err(|e| {
            SlicerError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - `date_field` must not be empty
    /// - `interval` must be positive
    /// - `size` must be greater than 0
    /// - `slicers` must be greater than 0
    /// - `start` must be before `end` when both are set
    /// - `subslice_by_key` requires `key_field`
    /// - `starting_key_depth` must be at least 1
    /// - `key_range` must not be empty when present
    pub fn validate(&self) -> Result<()> {
        if self.date_field.is_empty() {
            return Err(SlicerError::ConfigError(
                "date_field must not be empty".to_string(),
            ));
        }

        if self.interval.amount <= 0 {
            return Err(SlicerError::ConfigError(format!(
                "interval must be positive, got {}",
                self.interval
            )));
        }

        if self.size == 0 {
            return Err(SlicerError::ConfigError(
                "size must be greater than 0".to_string(),
            ));
        }

        if self.slicers == 0 {
            return Err(SlicerError::ConfigError(
                "slicers must be greater than 0".to_string(),
            ));
        }

        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(SlicerError::ConfigError(format!(
                    "start ({start}) must be before end ({end})"
                )));
            }
        }

        if self.subslice_by_key && self.key_field.is_none() {
            return Err(SlicerError::ConfigError(
                "If subslice_by_key is set to true, the key field parameter \
                 of the documents must also be set"
                    .to_string(),
            ));
        }

        if self.starting_key_depth == 0 {
            return Err(SlicerError::ConfigError(
                "starting_key_depth must be at least 1".to_string(),
            ));
        }

        if let Some(range) = &self.key_range {
            if range.is_empty() {
                return Err(SlicerError::ConfigError(
                    "key_range must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
