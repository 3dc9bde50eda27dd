//! Runtime configuration for the class system.

use serde::{Deserialize, Serialize};

/// Tunables for reactive writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    /// How many times a property's own `afterSet` may write the same
    /// property again (directly or through other hooks) before the write is
    /// rejected with `RecursionLimit`.
    pub max_reentrant_depth: usize,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            max_reentrant_depth: 16,
        }
    }
}
