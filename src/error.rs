//! Error types for the fallible engine boundaries

use thiserror::Error;

/// Errors raised while creating rigid bodies
#[derive(Debug, Error)]
pub enum PhysicsError {
    #[error("shape cannot be expressed by the physics backend: {0}")]
    UnsupportedShape(String),

    #[error("invalid body settings: {0}")]
    InvalidSettings(String),
}

/// Errors raised while reading or validating a scenario file
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported schema_version {found} (expected {expected})")]
    SchemaVersion { found: i64, expected: i64 },

    #[error("{path}: {message}")]
    Validation { path: String, message: String },
}

impl ScenarioError {
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while parsing launch options
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown flag '{0}'")]
    UnknownFlag(String),

    #[error("invalid value '{value}' for --{key}")]
    InvalidValue { key: String, value: String },
}
