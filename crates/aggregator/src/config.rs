//! Aggregator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default aggregation window in milliseconds
pub const DEFAULT_WINDOW_MS: u64 = 500;

/// Configuration for an [`Aggregator`](crate::Aggregator)
///
/// Serializable so embedders can carry it inside their own config
/// files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Aggregation window in milliseconds
    ///
    /// Zero or negative values fall back to [`DEFAULT_WINDOW_MS`]
    /// rather than erroring.
    pub window_ms: i64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS as i64,
        }
    }
}

impl AggregatorConfig {
    /// Create a configuration with the given window
    pub fn new(window_ms: i64) -> Self {
        Self { window_ms }
    }

    /// The effective debounce window
    ///
    /// Non-positive configured values coerce to the default window.
    pub fn window(&self) -> Duration {
        if self.window_ms <= 0 {
            Duration::from_millis(DEFAULT_WINDOW_MS)
        } else {
            Duration::from_millis(self.window_ms as u64)
        }
    }
}
