//! Core error types for autoplan-core.
//!
//! Only [`ConfigError`] aborts a scheduling run. Per-task problems
//! ([`ValidationError`], cycles, unschedulable tasks) are collected into the
//! plan instead of being returned as `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for autoplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Preferences are missing or malformed. Fatal for a run.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A collaborator failed to provide its part of the snapshot
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The run was cancelled; no partial plan is produced
    #[error("Scheduling run cancelled")]
    Cancelled,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Preference-specific errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to load preferences
    #[error("Failed to load preferences from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save preferences
    #[error("Failed to save preferences to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid preference value
    #[error("Invalid preference value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key not recognized by `get`/`set` or in the weights table
    #[error("Unknown preference key: {0}")]
    UnknownKey(String),

    /// Failed to parse preferences
    #[error("Failed to parse preferences: {0}")]
    ParseFailed(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Validation errors for a single task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end_time ({end}) must be greater than start_time ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Two tasks in one snapshot share an id
    #[error("Duplicate task id: {0}")]
    DuplicateId(String),

    /// A task lists itself in `blocked_by`
    #[error("Task {0} depends on itself")]
    SelfDependency(String),
}

/// Errors raised by snapshot collaborators.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The collaborator could not be reached or failed
    #[error("{collaborator} unavailable: {message}")]
    Unavailable {
        collaborator: String,
        message: String,
    },

    /// The collaborator returned data that could not be decoded
    #[error("Malformed snapshot data: {0}")]
    Malformed(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_core_error() {
        let err: CoreError = ConfigError::invalid("work_days", "must not be empty").into();
        assert!(matches!(err, CoreError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid preference value for 'work_days': must not be empty"
        );
    }

    #[test]
    fn toml_parse_error_maps_to_parse_failed() {
        let err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let cfg: ConfigError = err.into();
        assert!(matches!(cfg, ConfigError::ParseFailed(_)));
    }
}
