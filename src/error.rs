//! Error types for the index-slicer crate

use thiserror::Error;

/// Result type alias for slicer operations
pub type Result<T> = std::result::Result<T, SlicerError>;

/// Error types that can occur while partitioning an index
#[derive(Error, Debug, Clone)]
pub enum SlicerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Partial shard failure during probe: {0}")]
    PartialShardFailure(String),

    #[error("Probe failed: {0}")]
    ProbeFailure(String),

    #[error("max_retries met for slice, key: {identity} after {attempts} attempts")]
    RetriesExhausted { identity: String, attempts: usize },

    #[error("Invalid checkpoint: {0}")]
    CheckpointError(String),
}

impl SlicerError {
    /// Determine if a probe should be re-issued after this error
    ///
    /// Returns true for errors that are potentially transient and may succeed
    /// on retry:
    /// - Shard-level partial failures (some shards answered, some did not)
    /// - Transport-level probe failures (timeouts, connection resets)
    ///
    /// Returns false for errors that are permanent:
    /// - Configuration errors
    /// - Invalid ranges and checkpoints
    /// - An already-exhausted retry budget
    pub fn is_retryable(&self) -> bool {
        match self {
            // a partial shard failure means the count is untrustworthy, not
            // that the query is malformed
            SlicerError::PartialShardFailure(_) => true,

            // total query failures are retried until the budget is spent,
            // then surface as RetriesExhausted
            SlicerError::ProbeFailure(_) => true,

            SlicerError::ConfigError(_) => false,
            SlicerError::InvalidRange(_) => false,
            SlicerError::CheckpointError(_) => false,
            SlicerError::RetriesExhausted { .. } => false,
        }
    }
}
