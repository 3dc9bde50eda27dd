//! Settings for both contexts.

use serde::{Deserialize, Serialize};
use tandem_bridge::BridgeConfig;
use tandem_core::ReactiveConfig;

use crate::error::Result;

/// Everything [`Realms::connect`](crate::Realms::connect) needs.
///
/// Every section is optional in JSON; missing ones take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    pub reactive: ReactiveConfig,
    pub bridge: BridgeConfig,
}

impl TandemConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() {
        assert_eq!(TandemConfig::from_json("{}").unwrap(), TandemConfig::default());
    }

    #[test]
    fn sections_are_independent() {
        let config =
            TandemConfig::from_json(r#"{"bridge": {"announce_registrations": false}}"#).unwrap();
        assert!(!config.bridge.announce_registrations);
        assert_eq!(config.bridge.stale_after_secs, 30);
        assert_eq!(config.reactive, ReactiveConfig::default());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(TandemConfig::from_json("{").is_err());
    }
}
