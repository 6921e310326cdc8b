//! Shared test support: scripted and dataset-backed count probes
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use index_slicer::{CountProbe, ProbeQuery, Result, SlicerConfig, SortOrder};
use std::sync::Mutex;

/// Initialize test logging once per process
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Probe that replays a scripted sequence of responses
///
/// Extreme probes pop from `extremes` (ascending first, then descending, per
/// discovery order); count probes pop from `counts`. With `repeat_last`, the
/// final count response is replayed forever, like an index whose remaining
/// windows all look the same.
pub struct ScriptedProbe {
    extremes: Mutex<Vec<Option<DateTime<Utc>>>>,
    counts: Mutex<Vec<Result<u64>>>,
    repeat_last: bool,
    queries: Mutex<Vec<ProbeQuery>>,
}

impl ScriptedProbe {
    pub fn new(extremes: Vec<Option<DateTime<Utc>>>, counts: Vec<Result<u64>>) -> Self {
        ScriptedProbe {
            extremes: Mutex::new(extremes),
            counts: Mutex::new(counts),
            repeat_last: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Like [`new`], but the last count response repeats forever
    ///
    /// [`new`]: ScriptedProbe::new
    pub fn repeating(extremes: Vec<Option<DateTime<Utc>>>, counts: Vec<Result<u64>>) -> Self {
        ScriptedProbe {
            repeat_last: true,
            ..ScriptedProbe::new(extremes, counts)
        }
    }

    /// Every count query issued so far, in order
    pub fn queries(&self) -> Vec<ProbeQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CountProbe for ScriptedProbe {
    async fn count(&self, query: &ProbeQuery) -> Result<u64> {
        self.queries.lock().unwrap().push(query.clone());
        let mut counts = self.counts.lock().unwrap();
        assert!(
            !counts.is_empty(),
            "no scripted count left for query {query:?}"
        );
        if counts.len() == 1 && self.repeat_last {
            return counts[0].clone();
        }
        counts.remove(0)
    }

    async fn extreme(
        &self,
        _field: &str,
        _order: SortOrder,
        _base_query: Option<&str>,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut extremes = self.extremes.lock().unwrap();
        assert!(!extremes.is_empty(), "no scripted extreme left");
        Ok(extremes.remove(0))
    }
}

/// Probe backed by a synthetic set of timestamps
///
/// Counts are computed from the dataset, so any probe order a slicer chooses
/// sees a consistent index.
pub struct DatasetProbe {
    points: Vec<DateTime<Utc>>,
}

impl DatasetProbe {
    pub fn new(mut points: Vec<DateTime<Utc>>) -> Self {
        points.sort();
        DatasetProbe { points }
    }

    pub fn count_in(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
        self.points
            .iter()
            .filter(|&&p| p >= start && p < end)
            .count() as u64
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

#[async_trait]
impl CountProbe for DatasetProbe {
    async fn count(&self, query: &ProbeQuery) -> Result<u64> {
        let range = query.range.expect("dataset probe only answers dated queries");
        Ok(self.count_in(range.start, range.end))
    }

    async fn extreme(
        &self,
        _field: &str,
        order: SortOrder,
        _base_query: Option<&str>,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(match order {
            SortOrder::Ascending => self.points.first().copied(),
            SortOrder::Descending => self.points.last().copied(),
        })
    }
}

/// Config for date-slicing tests
pub fn date_config(interval: &str, size: u64) -> SlicerConfig {
    SlicerConfig {
        interval: interval.parse().unwrap(),
        size,
        ..Default::default()
    }
}

/// Config for key-slicing tests over the `events-` key field
pub fn key_config(size: u64, key_range: Option<Vec<char>>) -> SlicerConfig {
    SlicerConfig {
        size,
        key_field: Some("events-".to_string()),
        key_range,
        ..Default::default()
    }
}
