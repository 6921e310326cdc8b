//! Bounded retry of transient probe failures
//!
//! Count probes are latency-bound network calls that may fail transiently
//! (shard-level partial failures, connection resets). Each cursor wraps its
//! probe in [`RetryingProbe`], which retries retryable errors with
//! exponential backoff, keyed by a stable per-query identity. Exhausting the
//! budget is fatal for that cursor only.

use crate::error::{Result, SlicerError};
use crate::probe::{CountProbe, ProbeQuery};
use crate::models::SortOrder;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Ceiling on a single backoff wait
const MAX_BACKOFF_MS: u64 = 30_000;

/// Retry policy for failed probes
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt
    pub max_retries: usize,
    /// Backoff durations in milliseconds for each retry attempt
    pub backoff_ms: Vec<u64>,
}

impl RetryPolicy {
    /// Create a new retry policy with exponential backoff
    /// (100ms, 200ms, 400ms, ... capped at 30s)
    pub fn new(max_retries: usize) -> Self {
        let backoff_ms = (0..max_retries)
            .map(|i| {
                2u64.checked_pow(i as u32)
                    .and_then(|factor| factor.checked_mul(100))
                    .map(|ms| ms.min(MAX_BACKOFF_MS))
                    .unwrap_or(MAX_BACKOFF_MS)
            })
            .collect();

        RetryPolicy {
            max_retries,
            backoff_ms,
        }
    }

    /// Check if we should retry based on the attempt number and error
    pub fn should_retry(&self, attempt: usize, error: &SlicerError) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    /// Get the backoff duration for a given attempt
    pub fn backoff_duration(&self, attempt: usize) -> Duration {
        let ms = self
            .backoff_ms
            .get(attempt)
            .copied()
            .unwrap_or_else(|| *self.backoff_ms.last().unwrap_or(&1000));
        Duration::from_millis(ms)
    }
}

/// A [`CountProbe`] wrapper that retries transient failures
#[derive(Clone)]
pub struct RetryingProbe {
    inner: Arc<dyn CountProbe>,
    policy: RetryPolicy,
}

impl RetryingProbe {
    pub fn new(inner: Arc<dyn CountProbe>, policy: RetryPolicy) -> Self {
        RetryingProbe { inner, policy }
    }

    /// Count matching documents, retrying transient failures
    ///
    /// # Returns
    /// * `Ok(count)` possibly after retries
    /// * `Err(SlicerError::RetriesExhausted)` once the budget is spent
    /// * the original error when it is not retryable
    pub async fn count(&self, query: &ProbeQuery) -> Result<u64> {
        let mut attempt = 0;

        loop {
            match self.inner.count(query).await {
                Ok(count) => return Ok(count),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if !self.policy.should_retry(attempt, &e) {
                        return Err(SlicerError::RetriesExhausted {
                            identity: query.identity(),
                            attempts: attempt + 1,
                        });
                    }

                    let backoff = self.policy.backoff_duration(attempt);
                    warn!(
                        identity = %query.identity(),
                        attempt = attempt + 1,
                        ?backoff,
                        error = %e,
                        "count probe failed, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Probe an extreme timestamp, retrying transient failures
    pub async fn extreme(
        &self,
        field: &str,
        order: SortOrder,
        base_query: Option<&str>,
    ) -> Result<Option<DateTime<Utc>>> {
        let identity = format!("extreme_{}_{:?}", field, order);
        let mut attempt = 0;

        loop {
            match self.inner.extreme(field, order, base_query).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if !self.policy.should_retry(attempt, &e) {
                        return Err(SlicerError::RetriesExhausted {
                            identity,
                            attempts: attempt + 1,
                        });
                    }

                    let backoff = self.policy.backoff_duration(attempt);
                    warn!(
                        identity = %identity,
                        attempt = attempt + 1,
                        ?backoff,
                        error = %e,
                        "extreme probe failed, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
