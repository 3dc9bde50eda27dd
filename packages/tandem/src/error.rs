use tandem_bridge::BridgeError;
use tandem_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TandemError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TandemError>;
