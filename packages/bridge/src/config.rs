//! Bridge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for both ends of a bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Announce registrations to the app context as `remote:register` and
    /// `remote:deregister` events.
    pub announce_registrations: bool,

    /// Age in seconds after which a pending invocation is reported by
    /// `Dispatcher::stale`. Calls are never failed for being slow.
    pub stale_after_secs: u64,
}

impl BridgeConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            announce_registrations: true,
            stale_after_secs: 30,
        }
    }
}
