//! Configuration-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while building the router configuration.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// A provider was configured without a connection identifier
    #[error("Missing connection identifier for provider '{provider}' (set {variable})")]
    MissingConnection {
        /// Provider name
        provider: String,
        /// Environment variable that should carry the identifier
        variable: String,
    },

    /// Connection identifier could not be parsed
    #[error("Invalid connection identifier for provider '{provider}': {message}")]
    InvalidConnection {
        /// Provider name
        provider: String,
        /// Description of the parse failure
        message: String,
    },

    /// Config validation error (invalid values)
    #[error("Config validation error for {field}: {message}")]
    ValidationError {
        /// Name of the field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },
}

impl ConfigError {
    /// Create a validation error from validator output.
    pub fn from_validation(e: &validator::ValidationErrors) -> Self {
        let field = e
            .field_errors()
            .keys()
            .next()
            .map_or_else(|| "config".to_string(), ToString::to_string);
        Self::ValidationError { field, message: e.to_string() }
    }
}
