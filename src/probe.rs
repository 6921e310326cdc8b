//! The injected count-probe capability
//!
//! The partitioner never reads document bodies; it only asks the index how
//! many documents match a descriptor, and for the extreme timestamps of the
//! date field. The search client implementing [`CountProbe`] lives with the
//! caller.

use crate::error::Result;
use crate::models::{DateRange, SortOrder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A fully specified descriptor for a single count probe
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbeQuery {
    /// End-exclusive time bounds, formatted at the range's resolution
    pub range: Option<DateRange>,

    /// Field the time bounds apply to
    pub date_field: Option<String>,

    /// Prefix-match expression, e.g. `events-#a*`
    pub key: Option<String>,

    /// Free-text base filter combined with the bounds/key
    pub query: Option<String>,
}

impl ProbeQuery {
    /// Descriptor for a pure time window
    pub fn dated(field: &str, range: DateRange, base_query: Option<&str>) -> Self {
        ProbeQuery {
            range: Some(range),
            date_field: Some(field.to_string()),
            key: None,
            query: base_query.map(str::to_string),
        }
    }

    /// Descriptor for a pure key prefix
    pub fn keyed(key: String, base_query: Option<&str>) -> Self {
        ProbeQuery {
            range: None,
            date_field: None,
            key: Some(key),
            query: base_query.map(str::to_string),
        }
    }

    /// Attach a key expression to this descriptor
    pub fn with_key(mut self, key: String) -> Self {
        self.key = Some(key);
        self
    }

    /// Stable identity used to key retry budgets
    pub fn identity(&self) -> String {
        let mut parts = Vec::new();
        if let Some(range) = &self.range {
            parts.push(format!(
                "{}_{}",
                range.formatted_start(),
                range.formatted_end()
            ));
        }
        if let Some(key) = &self.key {
            parts.push(key.clone());
        }
        if parts.is_empty() {
            "unbounded".to_string()
        } else {
            parts.join("_")
        }
    }
}

/// Capability consumed from the search-engine client
///
/// Implementations must distinguish shard-level partial failures
/// ([`SlicerError::PartialShardFailure`], retryable) from total query
/// failures ([`SlicerError::ProbeFailure`], fatal once the retry budget is
/// exhausted).
///
/// [`SlicerError::PartialShardFailure`]: crate::SlicerError::PartialShardFailure
/// [`SlicerError::ProbeFailure`]: crate::SlicerError::ProbeFailure
#[async_trait]
pub trait CountProbe: Send + Sync {
    /// Number of documents matching the descriptor
    async fn count(&self, query: &ProbeQuery) -> Result<u64>;

    /// The single extreme timestamp of `field` under the base filter, or
    /// `None` when the filtered index holds no documents
    async fn extreme(
        &self,
        field: &str,
        order: SortOrder,
        base_query: Option<&str>,
    ) -> Result<Option<DateTime<Utc>>>;
}
