//! Error types for the remote-call bridge.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a failed remote call, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MethodNotFound,
    ChannelClosed,
    /// The privileged method itself reported a failure.
    Application,
    /// The privileged method panicked.
    Panic,
    /// A frame or payload could not be encoded or decoded.
    Codec,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MethodNotFound => "MethodNotFound",
            ErrorKind::ChannelClosed => "ChannelClosed",
            ErrorKind::Application => "Application",
            ErrorKind::Panic => "Panic",
            ErrorKind::Codec => "Codec",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The serializable error carried by a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Application, message)
    }
}

/// Errors raised by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The method is not on the namespace's whitelist, or the namespace is
    /// not registered.
    #[error("method not found: {namespace}.{method}")]
    MethodNotFound { namespace: String, method: String },

    /// Another object already serves this namespace.
    #[error("namespace already registered: {0}")]
    NamespaceTaken(String),

    /// The channel is closed; no further calls can complete on it.
    #[error("channel closed")]
    ChannelClosed,

    /// The remote side reported an error.
    #[error("remote error: {0}")]
    Remote(ErrorInfo),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn method_not_found(namespace: impl Into<String>, method: impl Into<String>) -> Self {
        BridgeError::MethodNotFound {
            namespace: namespace.into(),
            method: method.into(),
        }
    }

    /// An application failure reported by a privileged method.
    pub fn application(message: impl Into<String>) -> Self {
        BridgeError::Remote(ErrorInfo::application(message))
    }

    /// The wire category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::MethodNotFound { .. } => ErrorKind::MethodNotFound,
            BridgeError::ChannelClosed => ErrorKind::ChannelClosed,
            BridgeError::Remote(info) => info.kind,
            BridgeError::Codec(_) => ErrorKind::Codec,
            BridgeError::NamespaceTaken(_) => ErrorKind::Application,
        }
    }

    /// Normalize into the wire representation.
    pub fn to_info(&self) -> ErrorInfo {
        match self {
            BridgeError::Remote(info) => info.clone(),
            other => ErrorInfo::new(other.kind(), other.to_string()),
        }
    }

    /// Rebuild a local error from a failed response to `namespace.method`.
    pub fn from_info(info: ErrorInfo, namespace: &str, method: &str) -> Self {
        match info.kind {
            ErrorKind::MethodNotFound => BridgeError::method_not_found(namespace, method),
            ErrorKind::ChannelClosed => BridgeError::ChannelClosed,
            _ => BridgeError::Remote(info),
        }
    }
}

impl From<tandem_core::ConfigError> for BridgeError {
    fn from(error: tandem_core::ConfigError) -> Self {
        BridgeError::application(error.to_string())
    }
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
