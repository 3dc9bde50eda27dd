//! Error types for the class system.

use thiserror::Error;

/// An application error raised from inside a lifecycle hook.
///
/// Hooks use this to reject a value (validation) or to report a failed side
/// effect. It propagates unchanged out of the setter call that triggered the
/// hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct HookError {
    /// Short machine-readable category, e.g. `"Validation"`.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

impl HookError {
    /// Create a hook error with the generic `Application` kind.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind("Application", message)
    }

    pub fn with_kind(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by schema resolution, construction and reactive writes.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A class declaration is inconsistent with its ancestors. Fatal to the
    /// usability of that class.
    #[error("schema conflict in {class} for '{property}': {reason}")]
    SchemaConflict {
        class: String,
        property: String,
        reason: String,
    },

    /// A class (or one of its ancestors) was never registered.
    #[error("unknown class: {0}")]
    UnknownClass(String),

    /// A hook was registered for a property the resolved schema does not
    /// declare as reactive.
    #[error("{class} registers a hook for '{property}', which is not a reactive config")]
    OrphanHook { class: String, property: String },

    /// A constructor config contained a key absent from the resolved schema.
    #[error("unknown config key '{key}' for {class}")]
    UnknownConfigKey { class: String, key: String },

    /// A get/set named a property the schema does not declare.
    #[error("{class} has no config named '{property}'")]
    UnknownProperty { class: String, property: String },

    /// A property's own `afterSet` re-entered its setter too many times.
    #[error("'{property}' re-entered its own setter more than {limit} times")]
    RecursionLimit { property: String, limit: usize },

    /// The constructor config was not a map.
    #[error("config for {class} must be a map, got {found}")]
    InvalidConfig { class: String, found: String },

    /// A hook rejected the write or failed its side effect.
    #[error("hook failed: {0}")]
    Hook(#[from] HookError),

    /// A value could not be converted to or from a typed representation.
    #[error("value conversion failed: {0}")]
    Conversion(#[from] serde_json::Error),
}

impl ConfigError {
    /// Whether this is a structural framework error (bad class declaration
    /// or bad constructor input) rather than an application hook failure.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ConfigError::SchemaConflict { .. }
                | ConfigError::UnknownClass(_)
                | ConfigError::OrphanHook { .. }
                | ConfigError::UnknownConfigKey { .. }
                | ConfigError::InvalidConfig { .. }
        )
    }
}

/// Result type alias for class-system operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
