//! Error types for the survey sentiment engine
//!
//! Structured error definitions use thiserror; anyhow is only accepted at the
//! binary boundary and folded into [`EngineError::Other`].
//!
//! Most engine failure modes are deliberately *not* errors: a missing or
//! corrupt snapshot resolves to defaults (see [`crate::storage::LoadSource`])
//! and a failed snapshot write is reported through
//! [`crate::types::UpdateReport::persisted`].

use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Layered configuration could not be built
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// TOML configuration file could not be parsed
    #[error("Failed to parse config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration could not be rendered as TOML
    #[error("Failed to render config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Feedback carried a value the scorers cannot learn from
    #[error("Invalid feedback: {0}")]
    InvalidFeedback(String),

    /// A band or category name did not parse
    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Convert anyhow::Error to EngineError
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Other(err.to_string())
    }
}
