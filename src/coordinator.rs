//! Multi-cursor construction
//!
//! A job that wants N parallel fetch streams gets N independent cursors,
//! each over an even contiguous share of the global time range (date mode)
//! or of the key alphabet (id mode). Cursors share no mutable state and may
//! be driven concurrently; ordering between cursors is not guaranteed.

use crate::config::SlicerConfig;
use crate::date_slicer::DateRangeSlicer;
use crate::error::{Result, SlicerError};
use crate::events::{SlicerEvent, SlicerObserver};
use crate::key_slicer::{KeyAlphabet, KeySpaceSlicer};
use crate::models::{DateRange, Slice, SortOrder};
use crate::probe::CountProbe;
use crate::retry::{RetryPolicy, RetryingProbe};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds the independent cursors a job's parallel fetchers will drive
pub struct SlicerCoordinator {
    probe: Arc<dyn CountProbe>,
    observer: Arc<dyn SlicerObserver>,
    config: SlicerConfig,
}

impl SlicerCoordinator {
    /// Create a coordinator, validating the configuration eagerly
    pub fn new(
        probe: Arc<dyn CountProbe>,
        observer: Arc<dyn SlicerObserver>,
        config: SlicerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(SlicerCoordinator {
            probe,
            observer,
            config,
        })
    }

    /// Number of parallel cursors this configuration will create
    pub fn slicer_count(&self) -> usize {
        self.config.slicers
    }

    /// Resolve the effective global `[start, end)` bounds
    ///
    /// Missing bounds are discovered by probing the date field's extremes
    /// under the base filter; `end` is the latest observed timestamp plus one
    /// resolution unit so the end-exclusive interval covers the last record.
    ///
    /// # Returns
    /// * `Ok(Some(range))` - the data-bearing interval
    /// * `Ok(None)` - the filtered index holds no documents
    pub async fn resolve_range(&self) -> Result<Option<DateRange>> {
        let resolution = self.config.time_resolution;
        let probe = RetryingProbe::new(
            self.probe.clone(),
            RetryPolicy::new(self.config.max_retries),
        );

        let start = match self.config.start {
            Some(start) => Some(resolution.truncate(start)),
            None => probe
                .extreme(
                    &self.config.date_field,
                    SortOrder::Ascending,
                    self.config.query.as_deref(),
                )
                .await?
                .map(|dt| resolution.truncate(dt)),
        };

        let end = match self.config.end {
            Some(end) => Some(resolution.truncate(end)),
            None => probe
                .extreme(
                    &self.config.date_field,
                    SortOrder::Descending,
                    self.config.query.as_deref(),
                )
                .await?
                .map(|dt| resolution.add_units(resolution.truncate(dt), 1)),
        };

        match (start, end) {
            (Some(start), Some(end)) if start < end => {
                Ok(Some(DateRange::new(start, end, resolution)?))
            }
            (Some(start), Some(end)) => {
                warn!(
                    start = %resolution.format(start),
                    end = %resolution.format(end),
                    "resolved bounds hold no data-bearing interval"
                );
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Create N date cursors over even contiguous chunks of the resolved
    /// range
    ///
    /// # Arguments
    /// * `retry` - per-cursor checkpoints from a prior run, indexed by slicer
    ///   id; a resumed cursor continues at its checkpoint's end bound
    pub async fn date_slicers(&self, retry: &[Option<Slice>]) -> Result<Vec<DateRangeSlicer>> {
        let Some(range) = self.resolve_range().await? else {
            debug!("no matching documents, cursors start exhausted");
            return Ok((0..self.config.slicers)
                .map(|_| {
                    DateRangeSlicer::empty(
                        self.probe.clone(),
                        self.observer.clone(),
                        &self.config,
                    )
                })
                .collect());
        };

        info!(
            start = %range.formatted_start(),
            end = %range.formatted_end(),
            "resolved global date range"
        );
        self.observer.on_event(&SlicerEvent::RangeResolved {
            start: range.start,
            end: range.end,
        });

        divide_range(range, self.config.slicers)?
            .into_iter()
            .enumerate()
            .map(|(id, chunk)| {
                let last = retry.get(id).and_then(|slice| slice.as_ref());
                DateRangeSlicer::new(
                    self.probe.clone(),
                    self.observer.clone(),
                    &self.config,
                    chunk,
                    last,
                )
            })
            .collect()
    }

    /// Create N key cursors over even contiguous chunks of the alphabet
    pub fn key_slicers(&self, retry: &[Option<Slice>]) -> Result<Vec<KeySpaceSlicer>> {
        validate_key_parallelism(&self.config)?;

        let top_level =
            KeyAlphabet::top_level(self.config.key_type, self.config.key_range.as_deref());

        divide_symbols(&top_level, self.config.slicers)
            .into_iter()
            .enumerate()
            .map(|(id, symbols)| {
                let last_key = retry
                    .get(id)
                    .and_then(|slice| slice.as_ref())
                    .and_then(|slice| slice.key.as_deref());
                KeySpaceSlicer::new(
                    self.probe.clone(),
                    self.observer.clone(),
                    &self.config,
                    symbols,
                    last_key,
                )
            })
            .collect()
    }
}

/// Reject cursor counts the key space cannot support
pub fn validate_key_parallelism(config: &SlicerConfig) -> Result<()> {
    if let Some(range) = &config.key_range {
        if config.slicers > range.len() {
            return Err(SlicerError::ConfigError(
                "The number of slicers specified on the job cannot be more \
                 the length of key_range"
                    .to_string(),
            ));
        }
    } else {
        let max = KeyAlphabet::for_type(config.key_type).len();
        if config.slicers > max {
            return Err(SlicerError::ConfigError(format!(
                "The number of slicers specified on the job cannot be more than {max}"
            )));
        }
    }
    Ok(())
}

/// Divide a range into `n` contiguous chunks of equal width in resolution
/// units; the last chunk absorbs the remainder
fn divide_range(range: DateRange, n: usize) -> Result<Vec<DateRange>> {
    let units = range.width_units();
    if units < n as i64 {
        return Err(SlicerError::ConfigError(format!(
            "cannot create {n} slicers: the range only spans {units} resolution units"
        )));
    }

    let step = units / n as i64;
    let resolution = range.resolution;
    let mut chunks = Vec::with_capacity(n);
    for i in 0..n as i64 {
        let start = resolution.add_units(range.start, i * step);
        let end = if i == n as i64 - 1 {
            range.end
        } else {
            resolution.add_units(range.start, (i + 1) * step)
        };
        chunks.push(DateRange::new(start, end, resolution)?);
    }
    Ok(chunks)
}

/// Divide symbols into `n` contiguous chunks whose sizes differ by at most
/// one
fn divide_symbols(symbols: &[char], n: usize) -> Vec<Vec<char>> {
    let base = symbols.len() / n;
    let remainder = symbols.len() % n;
    let mut chunks = Vec::with_capacity(n);
    let mut offset = 0;
    for i in 0..n {
        let len = base + usize::from(i < remainder);
        chunks.push(symbols[offset..offset + len].to_vec());
        offset += len;
    }
    chunks
}
