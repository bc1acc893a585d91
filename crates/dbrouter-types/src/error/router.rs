//! Errors surfaced to callers of the router.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ConfigError, ProviderError};

/// Errors returned by `query` / `execute` and router construction.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum RouterError {
    /// No provider registered, or no master to fall back to
    #[error("No providers available")]
    NoProvidersAvailable,

    /// Writes are never redirected to a slave
    #[error("Master {provider} is unhealthy; write rejected")]
    MasterUnhealthy { provider: String },

    /// The selected provider (and its fallback, for reads) failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Router could not be built from its configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `shutdown` closed every backend; the router cannot be reused
    #[error("Router has been shut down")]
    ShutDown,

    /// Rows could not be deserialized into the requested type
    #[error("Failed to deserialize row: {message}")]
    Deserialize { message: String },
}

impl From<serde_json::Error> for RouterError {
    fn from(e: serde_json::Error) -> Self {
        Self::Deserialize { message: e.to_string() }
    }
}
