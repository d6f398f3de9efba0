//! Configuration Error Types
//!
//! Errors raised while loading, merging and validating the engine
//! configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Base configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigFileNotFound { path: PathBuf },

    /// Layered source failed to load or deserialize
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Invalid value for a field
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// Section failed validation
    #[error("Configuration validation failed for {section}: {reason}")]
    ValidationError { section: String, reason: String },
}

impl ConfigurationError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }

    pub fn validation_error(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValidationError {
            section: section.into(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigurationError> for crate::error::FleetSyncError {
    fn from(error: ConfigurationError) -> Self {
        crate::error::FleetSyncError::ConfigurationError(error.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;
