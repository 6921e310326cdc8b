//! Adaptive partitioner for remote search indexes
//!
//! # Overview
//!
//! This crate partitions an unbounded, unknown-size collection of
//! time-stamped or identifier-keyed records held in a remote search index
//! into a stream of bounded-size slices. Each slice is described by a query
//! the index can answer directly — a time window, or a key prefix layered on
//! top of a time window — and matches at most a configured number of
//! documents. Downstream parallel fetchers consume the slices; the
//! partitioner itself only ever reads counts, never document bodies.
//!
//! # Features
//!
//! - **Adaptive date slicing**: walks the time axis with live count probes,
//!   recursively halving oversized windows and geometrically expanding empty
//!   ones, down to a configured resolution (seconds or milliseconds)
//! - **Key-space slicing**: partitions a hexadecimal or base64url identifier
//!   alphabet into prefix ranges, descending into deeper prefixes when a
//!   range is too large
//! - **Subslice by key**: when a time window cannot shrink below one
//!   resolution unit and is still oversized, falls back to key-prefix
//!   partitioning of that window
//! - **Parallel cursors**: divides the global range or alphabet evenly
//!   across N independent cursors with no shared mutable state
//! - **Checkpoint resume**: any cursor can be reconstructed from the last
//!   emitted slice and continue where a prior run stopped
//! - **Bounded retries**: transient probe failures are retried with
//!   exponential backoff, keyed by a stable per-query identity
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use index_slicer::{NoopObserver, SlicerConfig, SlicerCoordinator};
//! use std::sync::Arc;
//!
//! # async fn run(probe: Arc<dyn index_slicer::CountProbe>) -> index_slicer::Result<()> {
//! let config = SlicerConfig::from_file("slicer.yaml")?;
//! let coordinator = SlicerCoordinator::new(probe, Arc::new(NoopObserver), config)?;
//!
//! for mut slicer in coordinator.date_slicers(&[]).await? {
//!     while let Some(slice) = slicer.next_slice().await? {
//!         println!("{slice:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`SlicerCoordinator`]: validates configuration, resolves the global
//!   bounds and builds the independent cursors
//! - [`DateRangeSlicer`]: cursor over a time range; expansion/reduction per
//!   step
//! - [`KeySpaceSlicer`]: cursor over an ordered key alphabet; explicit work
//!   stack, checkpoint resume
//! - [`SubsliceBridge`]: key-prefix fallback for irreducible date windows
//! - [`CountProbe`]: the injected capability backed by the caller's search
//!   client
//! - [`SlicerObserver`]: synchronous sink for recursion/expansion/
//!   range-resolved events
//!
//! # Concurrency contract
//!
//! Calls to `next_slice` on the *same* cursor must be serialized by the
//! caller; each call is a self-contained computation that suspends on probe
//! I/O and leaves no background work behind. Different cursors are fully
//! independent. Slices are emitted at-least-once across resumes: consumers
//! must tolerate exact-duplicate slice reprocessing after a restart.

pub mod config;
pub mod coordinator;
pub mod date_slicer;
pub mod error;
pub mod events;
pub mod key_slicer;
pub mod models;
pub mod probe;
pub mod retry;
pub mod subslice;

// Re-export commonly used types
pub use config::{Interval, IntervalUnit, KeyType, SlicerConfig};
pub use coordinator::{validate_key_parallelism, SlicerCoordinator};
pub use date_slicer::DateRangeSlicer;
pub use error::{Result, SlicerError};
pub use events::{NoopObserver, RecordingObserver, SlicerEvent, SlicerObserver};
pub use key_slicer::{KeyAlphabet, KeySpaceSlicer};
pub use models::{DateRange, Slice, SortOrder, TimeResolution};
pub use probe::{CountProbe, ProbeQuery};
pub use retry::{RetryPolicy, RetryingProbe};
pub use subslice::SubsliceBridge;
