//! Adaptive date-range slicing
//!
//! The cursor walks `[global_start, global_end)` left to right. Each step
//! probes the count of the next nominal window, then adapts: an empty window
//! is geometrically widened until data appears (expansion); an oversized
//! window is repeatedly halved (reduction), always resolving the earlier half
//! first — the cursor advance revisits the remainder on the next step.
//! Reduction stops at one resolution unit; an irreducible window either
//! falls back to key-prefix subslicing or is emitted oversized.

use crate::config::SlicerConfig;
use crate::error::{Result, SlicerError};
use crate::events::{SlicerEvent, SlicerObserver};
use crate::key_slicer::KeyAlphabet;
use crate::models::{DateRange, Slice, TimeResolution};
use crate::probe::{CountProbe, ProbeQuery};
use crate::retry::{RetryPolicy, RetryingProbe};
use crate::subslice::SubsliceBridge;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key-subslicing parameters carried by a date cursor
#[derive(Debug, Clone)]
struct SubsliceParams {
    key_field: String,
    alphabet: KeyAlphabet,
    threshold: u64,
}

/// Cursor over a bounded time range, producing one slice per call
pub struct DateRangeSlicer {
    probe: RetryingProbe,
    observer: Arc<dyn SlicerObserver>,
    date_field: String,
    resolution: TimeResolution,
    interval: Duration,
    size: u64,
    base_query: Option<String>,
    subslice: Option<SubsliceParams>,
    current_start: DateTime<Utc>,
    global_end: DateTime<Utc>,
    /// Subslices queued by the bridge, drained one per call
    pending: VecDeque<Slice>,
    /// A keyed checkpoint's window and key; the window's remaining prefixes
    /// are replayed on the first call before the date walk continues
    resume_subslice: Option<(DateRange, String)>,
    exhausted: bool,
}

impl DateRangeSlicer {
    /// Create a cursor over `range`
    ///
    /// # Arguments
    /// * `probe` - count capability
    /// * `observer` - event sink
    /// * `config` - validated configuration
    /// * `range` - this cursor's allotment of the global range
    /// * `last_slice` - checkpoint from a prior run; the cursor resumes at
    ///   the checkpoint's end bound. A keyed checkpoint first replays the
    ///   remaining prefixes of its window
    pub fn new(
        probe: Arc<dyn CountProbe>,
        observer: Arc<dyn SlicerObserver>,
        config: &SlicerConfig,
        range: DateRange,
        last_slice: Option<&Slice>,
    ) -> Result<Self> {
        let resolution = range.resolution;
        let interval = config.interval.to_duration();
        if interval < resolution.unit() {
            return Err(SlicerError::ConfigError(format!(
                "interval {} is finer than the time resolution",
                config.interval
            )));
        }

        let subslice = if config.subslice_by_key {
            let key_field = config.key_field.clone().ok_or_else(|| {
                SlicerError::ConfigError(
                    "If subslice_by_key is set to true, the key field parameter \
                     of the documents must also be set"
                        .to_string(),
                )
            })?;
            Some(SubsliceParams {
                key_field,
                alphabet: KeyAlphabet::for_type(config.key_type),
                threshold: config.subslice_key_threshold,
            })
        } else {
            None
        };

        let (current_start, resume_subslice) = match last_slice {
            Some(slice) => {
                let end = slice.end.ok_or_else(|| {
                    SlicerError::CheckpointError(
                        "date checkpoint is missing an end bound".to_string(),
                    )
                })?;
                // a keyed checkpoint sits mid-window: the rest of that
                // window's prefixes must be replayed before the date walk
                // moves past it
                match (&slice.key, slice.start) {
                    (Some(key), Some(start)) if start < end => {
                        let window = DateRange::new(start, end, resolution)?;
                        (end, Some((window, key.clone())))
                    }
                    _ => (end, None),
                }
            }
            None => (range.start, None),
        };

        if resume_subslice.is_some() && subslice.is_none() {
            return Err(SlicerError::CheckpointError(
                "checkpoint is a key subslice but subslice_by_key is not enabled".to_string(),
            ));
        }

        Ok(DateRangeSlicer {
            probe: RetryingProbe::new(probe, RetryPolicy::new(config.max_retries)),
            observer,
            date_field: config.date_field.clone(),
            resolution,
            interval,
            size: config.size,
            base_query: config.query.clone(),
            subslice,
            exhausted: current_start >= range.end,
            current_start,
            global_end: range.end,
            pending: VecDeque::new(),
            resume_subslice,
        })
    }

    /// A cursor over an empty discovered range; always returns `None`
    pub(crate) fn empty(
        probe: Arc<dyn CountProbe>,
        observer: Arc<dyn SlicerObserver>,
        config: &SlicerConfig,
    ) -> Self {
        let now = config.time_resolution.truncate(Utc::now());
        DateRangeSlicer {
            probe: RetryingProbe::new(probe, RetryPolicy::new(config.max_retries)),
            observer,
            date_field: config.date_field.clone(),
            resolution: config.time_resolution,
            interval: config.interval.to_duration(),
            size: config.size,
            base_query: config.query.clone(),
            subslice: None,
            current_start: now,
            global_end: now,
            pending: VecDeque::new(),
            resume_subslice: None,
            exhausted: true,
        }
    }

    fn clamp(&self, dt: DateTime<Utc>) -> DateTime<Utc> {
        dt.min(self.global_end)
    }

    /// Split point `units/2` past `from`, or `None` when the span is below
    /// two resolution units and cannot be halved
    fn midpoint(&self, from: DateTime<Utc>, end: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let units = self.resolution.units_between(from, end);
        if units < 2 {
            return None;
        }
        Some(self.resolution.add_units(from, units / 2))
    }

    async fn count(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64> {
        let range = DateRange::new(start, end, self.resolution)?;
        let query = ProbeQuery::dated(&self.date_field, range, self.base_query.as_deref());
        self.probe.count(&query).await
    }

    fn advance(&mut self, end: DateTime<Utc>) {
        self.current_start = end;
        if self.current_start >= self.global_end {
            self.exhausted = true;
        }
    }

    /// Produce the next bounded slice, or `None` once the range is exhausted
    ///
    /// Each call may issue several count probes; calls on the same cursor
    /// must be serialized by the caller.
    pub async fn next_slice(&mut self) -> Result<Option<Slice>> {
        if let Some((window, last_key)) = self.resume_subslice.take() {
            self.replay_subslices(window, &last_key).await?;
        }
        if let Some(slice) = self.pending.pop_front() {
            return Ok(Some(slice));
        }
        if self.exhausted {
            return Ok(None);
        }

        let start = self.current_start;
        let mut end = self.clamp(start + self.interval);
        let mut count = self.count(start, end).await?;

        // expansion: double the effective width until data or the global end
        let mut width = self.interval;
        let mut expanded_from: Option<DateTime<Utc>> = None;
        while count == 0 && end < self.global_end {
            expanded_from = Some(end);
            width = width * 2;
            end = self.clamp(start + width);
            debug!(
                start = %self.resolution.format(start),
                end = %self.resolution.format(end),
                "empty window, expanding"
            );
            self.observer.on_event(&SlicerEvent::RangeExpansion);
            count = self.count(start, end).await?;
        }

        if count == 0 {
            // no data between here and the global end
            self.advance(self.global_end);
            return Ok(Some(Slice::dated(start, self.global_end, 0)));
        }

        // reduction: halve until within the ceiling or at the resolution floor
        while count > self.size {
            // an expanded window first splits at the midpoint of the
            // expansion, not of the whole window
            let mid = expanded_from
                .take()
                .and_then(|prev| self.midpoint(prev, end))
                .or_else(|| self.midpoint(start, end));

            let Some(mid) = mid else {
                return self.finish_irreducible(start, end, count).await;
            };

            debug!(
                start = %self.resolution.format(start),
                end = %self.resolution.format(mid),
                count,
                size = self.size,
                "window over ceiling, bisecting"
            );
            self.observer.on_event(&SlicerEvent::Recursion);
            end = mid;
            count = self.count(start, end).await?;
        }

        self.advance(end);
        Ok(Some(Slice::dated(start, end, count)))
    }

    /// Re-partition a checkpointed window and queue the prefixes after the
    /// checkpointed key
    ///
    /// Prefixes at or before the key were already consumed by the prior run.
    /// A key the fresh partition no longer produces replays the whole window;
    /// consumers tolerate duplicate slices across resumes.
    async fn replay_subslices(&mut self, window: DateRange, last_key: &str) -> Result<()> {
        let params = self.subslice.clone().ok_or_else(|| {
            SlicerError::CheckpointError(
                "checkpoint is a key subslice but subslice_by_key is not enabled".to_string(),
            )
        })?;
        let bridge = SubsliceBridge::new(
            &self.probe,
            &self.observer,
            &params.key_field,
            &params.alphabet,
            params.threshold,
            &self.date_field,
            self.base_query.as_deref(),
        );
        let mut slices = bridge.partition(window).await?;
        if let Some(pos) = slices
            .iter()
            .position(|s| s.key.as_deref() == Some(last_key))
        {
            slices.drain(..=pos);
        }
        self.pending.extend(slices);
        Ok(())
    }

    /// Handle a window at the resolution floor that is still over the ceiling
    async fn finish_irreducible(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        count: u64,
    ) -> Result<Option<Slice>> {
        self.advance(end);

        if let Some(params) = self.subslice.clone() {
            if count >= params.threshold {
                let window = DateRange::new(start, end, self.resolution)?;
                let bridge = SubsliceBridge::new(
                    &self.probe,
                    &self.observer,
                    &params.key_field,
                    &params.alphabet,
                    params.threshold,
                    &self.date_field,
                    self.base_query.as_deref(),
                );
                let mut slices = bridge.partition(window).await?;
                if !slices.is_empty() {
                    let first = slices.remove(0);
                    self.pending.extend(slices);
                    return Ok(Some(first));
                }
            }
        }

        warn!(
            start = %self.resolution.format(start),
            end = %self.resolution.format(end),
            count,
            size = self.size,
            "window at resolution floor exceeds size ceiling, emitting oversized slice"
        );
        Ok(Some(Slice::dated(start, end, count)))
    }
}
