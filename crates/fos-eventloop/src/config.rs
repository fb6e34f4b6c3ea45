//! Event Loop Configuration

use serde::{Deserialize, Serialize};

/// Event loop configuration options
///
/// Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Maximum microtasks run by a single drain (`None` for no limit)
    pub microtask_budget: Option<usize>,

    /// Report rejected promises still lacking a handler after each drain
    pub track_unhandled_rejections: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            microtask_budget: Some(1_000_000),
            track_unhandled_rejections: true,
        }
    }
}
