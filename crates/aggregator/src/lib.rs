//! Debounced task-sequence aggregation for Coalesce
//!
//! This crate coalesces rapid trigger events (file-system notifications,
//! watch callbacks) into a single ordered run of named tasks:
//! - Sequences enqueued within the window are merged into one queue
//! - Every enqueue restarts the window (sliding debounce)
//! - On expiry the merged sequence is handed to a pluggable executor
//! - Each trigger site can attach its own completion callback
//!
//! The merge itself lives in the `sequence` crate; this crate owns the
//! queue, the timer, and the executor boundary.

pub mod config;
pub mod debounce;
pub mod executor;

pub use config::AggregatorConfig;
pub use debounce::Aggregator;
pub use executor::Executor;

// Re-exported so embedders don't need a direct `sequence` dependency.
pub use sequence::{merge, Callback, Element, MergeError, Step};
