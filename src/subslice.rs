//! Key-prefix fallback for irreducible date windows
//!
//! When a window is one resolution unit wide and still over the size
//! ceiling, time-based reduction is exhausted. The bridge partitions that
//! window by identifier prefix instead: one slice per top-level alphabet
//! symbol, each scoped to the window. The partition is flat; a symbol whose
//! count still exceeds the threshold is expanded a single depth further,
//! after which overflow is accepted like any other irreducible leaf.

use crate::error::Result;
use crate::events::{SlicerEvent, SlicerObserver};
use crate::key_slicer::KeyAlphabet;
use crate::models::{DateRange, Slice};
use crate::probe::ProbeQuery;
use crate::retry::RetryingProbe;
use std::sync::Arc;
use tracing::{debug, warn};

/// One-level key partition of a date window
pub struct SubsliceBridge<'a> {
    probe: &'a RetryingProbe,
    observer: &'a Arc<dyn SlicerObserver>,
    key_field: &'a str,
    alphabet: &'a KeyAlphabet,
    threshold: u64,
    date_field: &'a str,
    base_query: Option<&'a str>,
}

impl<'a> SubsliceBridge<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        probe: &'a RetryingProbe,
        observer: &'a Arc<dyn SlicerObserver>,
        key_field: &'a str,
        alphabet: &'a KeyAlphabet,
        threshold: u64,
        date_field: &'a str,
        base_query: Option<&'a str>,
    ) -> Self {
        SubsliceBridge {
            probe,
            observer,
            key_field,
            alphabet,
            threshold,
            date_field,
            base_query,
        }
    }

    async fn count(&self, window: DateRange, path: &str) -> Result<(u64, String)> {
        let key = format!("{}#{}*", self.key_field, path);
        let query = ProbeQuery::dated(self.date_field, window, self.base_query)
            .with_key(key.clone());
        let count = self.probe.count(&query).await?;
        Ok((count, key))
    }

    /// Partition the window into one slice per alphabet symbol
    ///
    /// Counts are probed per symbol; an empty deeper prefix produced by a
    /// secondary expansion is skipped, top-level symbols are always emitted.
    pub async fn partition(&self, window: DateRange) -> Result<Vec<Slice>> {
        let mut slices = Vec::with_capacity(self.alphabet.len());

        for &symbol in self.alphabet.symbols() {
            let (count, key) = self.count(window, &symbol.to_string()).await?;

            if count <= self.threshold {
                slices.push(Slice::keyed_window(window.start, window.end, count, key));
                continue;
            }

            // secondary depth expansion, one level only
            debug!(key = %key, count, threshold = self.threshold, "subslice prefix over threshold, expanding one depth");
            self.observer.on_event(&SlicerEvent::Recursion);

            for &child in self.alphabet.symbols() {
                let path = format!("{symbol}{child}");
                let (child_count, child_key) = self.count(window, &path).await?;
                if child_count == 0 {
                    continue;
                }
                if child_count > self.threshold {
                    warn!(
                        key = %child_key,
                        count = child_count,
                        threshold = self.threshold,
                        "subslice leaf exceeds threshold, emitting oversized slice"
                    );
                }
                slices.push(Slice::keyed_window(
                    window.start,
                    window.end,
                    child_count,
                    child_key,
                ));
            }
        }

        Ok(slices)
    }
}
