//! Bridge Configuration

use serde::{Deserialize, Serialize};

/// Promise bridge configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Global the constructor is installed under
    pub global_name: String,

    /// Deepest nesting of arrays, plain objects and errors that is
    /// marshalled structurally; deeper values cross by reference
    pub max_marshal_depth: usize,

    /// Most elements a combinator consumes from one iterable
    pub max_iterable_length: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            global_name: "Promise".to_string(),
            max_marshal_depth: 128,
            max_iterable_length: 1_000_000,
        }
    }
}
